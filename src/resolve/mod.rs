//! Reference resolution
//!
//! A pure pass joining the two independently built snapshots: extracted
//! documents on one side, the repository index on the other. Resolution
//! never mutates the index and has no cross-document interaction, so it
//! runs in parallel per document.

use crate::adapter::AdapterRegistry;
use crate::extract::{CodeBlock, Document, Link, LinkTarget, SymbolReference};
use crate::index::{split_components, RepoIndex, SymbolEntry, SymbolKind};
use crate::report::{Finding, FindingCategory, Severity};
use rayon::prelude::*;
use std::collections::HashMap;

/// An absolute URL reference awaiting a liveness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRef {
    pub url: String,
    /// Originating document
    pub file: String,
    /// 1-based line in the originating document
    pub line: usize,
}

/// A code block pinned to a source location, ready for drift comparison
#[derive(Debug, Clone)]
pub struct DriftCandidate {
    /// Originating document
    pub file: String,
    pub block: CodeBlock,
    /// The source symbol the block illustrates
    pub symbol: SymbolEntry,
}

/// Output of the resolution pass
#[derive(Debug, Default)]
pub struct Resolution {
    pub findings: Vec<Finding>,
    pub url_refs: Vec<UrlRef>,
    pub drift_candidates: Vec<DriftCandidate>,
}

impl Resolution {
    fn merge(mut self, other: Resolution) -> Resolution {
        self.findings.extend(other.findings);
        self.url_refs.extend(other.url_refs);
        self.drift_candidates.extend(other.drift_candidates);
        self
    }
}

/// Resolves extracted artifacts against the repository index
pub struct Resolver<'a> {
    index: &'a RepoIndex,
    registry: &'a AdapterRegistry,
    documents: &'a [Document],
    /// Extracted documents by path, for anchor lookups
    by_path: HashMap<&'a str, &'a Document>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the completed index and document set
    pub fn new(
        index: &'a RepoIndex,
        registry: &'a AdapterRegistry,
        documents: &'a [Document],
    ) -> Self {
        let by_path = documents.iter().map(|d| (d.path.as_str(), d)).collect();
        Self {
            index,
            registry,
            documents,
            by_path,
        }
    }

    /// Resolve every artifact of every document
    pub fn resolve(&self) -> Resolution {
        self.documents
            .par_iter()
            .map(|doc| self.resolve_document(doc))
            .reduce(Resolution::default, Resolution::merge)
    }

    fn resolve_document(&self, doc: &Document) -> Resolution {
        let mut out = Resolution::default();

        for link in &doc.links {
            self.resolve_link(doc, link, &mut out);
        }
        for symbol_ref in &doc.symbol_refs {
            self.resolve_symbol(doc, symbol_ref, &mut out);
        }
        for block in &doc.code_blocks {
            self.associate_block(doc, block, &mut out);
        }

        out
    }

    fn resolve_link(&self, doc: &Document, link: &Link, out: &mut Resolution) {
        match &link.target {
            LinkTarget::Relative { path, anchor } => {
                let doc_dir = parent_dir(&doc.path);
                let Some(resolved) = normalize_relative(doc_dir, path) else {
                    out.findings.push(Finding::new(
                        FindingCategory::BrokenLink,
                        Severity::Medium,
                        &doc.path,
                        link.line,
                        format!("Broken link: {} (target outside repository)", path),
                        path,
                    ));
                    return;
                };

                if !self.index.contains_file(&resolved) {
                    out.findings.push(Finding::new(
                        FindingCategory::BrokenLink,
                        Severity::Medium,
                        &doc.path,
                        link.line,
                        format!("Broken link: {}", path),
                        &resolved,
                    ));
                    return;
                }

                if let Some(anchor) = anchor {
                    // Anchor slugs are only enforced when the target was
                    // extracted; other file kinds resolve on existence alone.
                    if let Some(target_doc) = self.by_path.get(resolved.as_str()) {
                        if !target_doc.has_anchor(anchor) {
                            out.findings.push(Finding::new(
                                FindingCategory::BrokenLink,
                                Severity::Medium,
                                &doc.path,
                                link.line,
                                format!("Broken link: anchor not found: {}#{}", path, anchor),
                                &format!("{}#{}", resolved, anchor),
                            ));
                        }
                    }
                }
            }

            LinkTarget::AnchorOnly { anchor } => {
                if !doc.has_anchor(anchor) {
                    out.findings.push(Finding::new(
                        FindingCategory::BrokenLink,
                        Severity::Medium,
                        &doc.path,
                        link.line,
                        format!("Broken link: anchor not found: #{}", anchor),
                        &format!("{}#{}", doc.path, anchor),
                    ));
                }
            }

            LinkTarget::Absolute { url } => {
                if valid_url_syntax(url) {
                    out.url_refs.push(UrlRef {
                        url: url.clone(),
                        file: doc.path.clone(),
                        line: link.line,
                    });
                } else {
                    out.findings.push(Finding::new(
                        FindingCategory::BrokenLink,
                        Severity::Medium,
                        &doc.path,
                        link.line,
                        format!("Broken link: malformed URL: {}", url),
                        url,
                    ));
                }
            }
        }
    }

    fn resolve_symbol(&self, doc: &Document, symbol_ref: &SymbolReference, out: &mut Resolution) {
        let token = &symbol_ref.token;

        if self.index.symbol(token).is_some() {
            return;
        }

        let components = split_components(token);
        match self.lookup_suffix(&components) {
            Lookup::Unique => {}
            Lookup::Ambiguous(count) => {
                out.findings.push(Finding::new(
                    FindingCategory::StaleSymbol,
                    Severity::Low,
                    &doc.path,
                    symbol_ref.line,
                    format!("Ambiguous symbol reference: {} ({} candidates)", token, count),
                    token,
                ));
            }
            Lookup::NotFound => {
                // Tolerate one unindexed package prefix before giving up
                let retried = components.len() > 1
                    && !matches!(self.lookup_suffix(&components[1..]), Lookup::NotFound);
                if retried {
                    if let Lookup::Ambiguous(count) = self.lookup_suffix(&components[1..]) {
                        out.findings.push(Finding::new(
                            FindingCategory::StaleSymbol,
                            Severity::Low,
                            &doc.path,
                            symbol_ref.line,
                            format!("Ambiguous symbol reference: {} ({} candidates)", token, count),
                            token,
                        ));
                    }
                    return;
                }

                out.findings.push(Finding::new(
                    FindingCategory::StaleSymbol,
                    Severity::Medium,
                    &doc.path,
                    symbol_ref.line,
                    format!("Symbol not found: {}", token),
                    token,
                ));
            }
        }
    }

    fn lookup_suffix(&self, components: &[&str]) -> Lookup {
        match self.index.symbols_matching_suffix(components).len() {
            0 => Lookup::NotFound,
            1 => Lookup::Unique,
            count => Lookup::Ambiguous(count),
        }
    }

    /// Pin a code block to a source location: explicit hint first, then a
    /// best-effort declared-name match. Blocks with no plausible match stay
    /// unassociated; narrative snippets are not rot by themselves.
    fn associate_block(&self, doc: &Document, block: &CodeBlock, out: &mut Resolution) {
        if let Some(hint) = &block.hint {
            match self.resolve_hint(hint.path.as_str(), hint.symbol.as_deref()) {
                Some(symbol) => out.drift_candidates.push(DriftCandidate {
                    file: doc.path.clone(),
                    block: block.clone(),
                    symbol,
                }),
                None => out.findings.push(Finding::new(
                    FindingCategory::CodeDrift,
                    Severity::Medium,
                    &doc.path,
                    block.start_line,
                    format!(
                        "Code drift: hinted source not found: {}{}",
                        hint.path,
                        hint.symbol
                            .as_deref()
                            .map(|s| format!("#{}", s))
                            .unwrap_or_default()
                    ),
                    &hint.path,
                )),
            }
            return;
        }

        let Some(language) = block.language.as_deref() else {
            return;
        };
        let Some(adapter) = self.registry.for_tag(language) else {
            return;
        };

        for name in adapter.declared_names(&block.text) {
            let matches = self.index.symbols_named(&name);
            if matches.len() == 1 {
                out.drift_candidates.push(DriftCandidate {
                    file: doc.path.clone(),
                    block: block.clone(),
                    symbol: matches[0].clone(),
                });
                return;
            }
        }
    }

    fn resolve_hint(&self, path: &str, symbol: Option<&str>) -> Option<SymbolEntry> {
        let entry = self.index.file(path)?;

        match symbol {
            Some(name) => self
                .index
                .symbols_named(name)
                .into_iter()
                .find(|s| s.path == path)
                .cloned(),
            // A bare file hint compares against the whole file
            None => Some(SymbolEntry {
                qualified: path.to_string(),
                path: path.to_string(),
                start_line: 1,
                end_line: entry.line_count.max(1),
                kind: SymbolKind::Module,
            }),
        }
    }
}

enum Lookup {
    Unique,
    Ambiguous(usize),
    NotFound,
}

/// Directory of a normalized relative path ("" for the root)
fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|pos| &path[..pos]).unwrap_or("")
}

/// Resolve a link target against a document directory, normalizing `.` and
/// `..`. Returns `None` when the target escapes the repository root.
fn normalize_relative(doc_dir: &str, target: &str) -> Option<String> {
    let mut parts: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        doc_dir.split('/').filter(|c| !c.is_empty()).collect()
    };

    for component in target.trim_start_matches('/').split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            component => parts.push(component),
        }
    }

    Some(parts.join("/"))
}

/// Minimal syntax check: http(s) scheme with a non-empty host
fn valid_url_syntax(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or("");
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MarkdownExtractor;
    use crate::index::{IgnoreSet, RepoIndexer};
    use crate::scan::CancelFlag;
    use std::path::Path;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn resolve_fixture(files: &[(&str, &str)]) -> Resolution {
        let tmp = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            write(tmp.path(), rel, content);
        }

        let registry = AdapterRegistry::default();
        let indexer = RepoIndexer::new(tmp.path(), IgnoreSet::default(), &registry);
        let (index, _) = indexer.index(&CancelFlag::new()).unwrap();

        let extractor = MarkdownExtractor::new(&registry);
        let documents: Vec<Document> = index
            .doc_files()
            .map(|entry| {
                let content = std::fs::read_to_string(tmp.path().join(&entry.path)).unwrap();
                extractor.extract(&entry.path, &content)
            })
            .collect();

        Resolver::new(&index, &registry, &documents).resolve()
    }

    #[test]
    fn test_valid_relative_link() {
        let resolution = resolve_fixture(&[
            ("docs/guide.md", "[setup](./setup.md)\n"),
            ("docs/setup.md", "# Install\n"),
        ]);
        assert!(resolution.findings.is_empty());
    }

    #[test]
    fn test_missing_target_is_broken_link() {
        let resolution = resolve_fixture(&[("docs/guide.md", "[gone](./gone.md)\n")]);

        assert_eq!(resolution.findings.len(), 1);
        let finding = &resolution.findings[0];
        assert_eq!(finding.category, FindingCategory::BrokenLink);
        assert_eq!(finding.file, "docs/guide.md");
        assert_eq!(finding.line, 1);
    }

    #[test]
    fn test_anchor_not_found_even_when_file_exists() {
        let resolution = resolve_fixture(&[
            ("guide.md", "[setup](./setup.md#install)\n"),
            ("setup.md", "# Getting Started\n"),
        ]);

        assert_eq!(resolution.findings.len(), 1);
        assert!(resolution.findings[0].message.contains("anchor not found"));
    }

    #[test]
    fn test_matching_anchor_is_valid() {
        let resolution = resolve_fixture(&[
            ("guide.md", "[setup](./setup.md#install)\n"),
            ("setup.md", "# Install\n"),
        ]);
        assert!(resolution.findings.is_empty());
    }

    #[test]
    fn test_same_document_anchor() {
        let resolution = resolve_fixture(&[(
            "README.md",
            "# Usage\n\nJump to [usage](#usage) or [missing](#missing).\n",
        )]);

        assert_eq!(resolution.findings.len(), 1);
        assert!(resolution.findings[0].message.contains("#missing"));
    }

    #[test]
    fn test_escaping_root_is_broken() {
        let resolution = resolve_fixture(&[("guide.md", "[up](../outside.md)\n")]);

        assert_eq!(resolution.findings.len(), 1);
        assert!(resolution.findings[0].message.contains("outside repository"));
    }

    #[test]
    fn test_symbol_exact_match_is_valid() {
        let resolution = resolve_fixture(&[
            ("src/config.rs", "pub fn parse_config() {}\n"),
            ("README.md", "```rust\nuse config::parse_config;\n```\n"),
        ]);
        assert!(resolution.findings.is_empty());
    }

    #[test]
    fn test_symbol_not_found() {
        let resolution = resolve_fixture(&[
            ("src/config.rs", "pub fn parse_config() {}\n"),
            ("README.md", "```rust\nuse config::parse_settings;\n```\n"),
        ]);

        assert_eq!(resolution.findings.len(), 1);
        let finding = &resolution.findings[0];
        assert_eq!(finding.category, FindingCategory::StaleSymbol);
        assert_eq!(finding.severity, Severity::Medium);
        assert!(finding.message.contains("not found"));
    }

    #[test]
    fn test_ambiguous_suffix_match() {
        let resolution = resolve_fixture(&[
            ("src/alpha.rs", "pub fn render() {}\n"),
            ("src/beta.rs", "pub fn render() {}\n"),
            ("README.md", "Call `stale::render()` for output.\n"),
        ]);

        assert_eq!(resolution.findings.len(), 1);
        let finding = &resolution.findings[0];
        assert_eq!(finding.category, FindingCategory::StaleSymbol);
        assert_eq!(finding.severity, Severity::Low);
        assert!(finding.message.contains("Ambiguous"));
    }

    #[test]
    fn test_package_prefix_is_tolerated() {
        let resolution = resolve_fixture(&[
            ("src/config.rs", "pub fn parse_config() {}\n"),
            ("README.md", "```rust\nuse docrot::config::parse_config;\n```\n"),
        ]);
        assert!(resolution.findings.is_empty());
    }

    #[test]
    fn test_unassociated_block_is_not_a_finding() {
        let resolution = resolve_fixture(&[
            ("src/lib.rs", "pub fn run() {}\n"),
            ("README.md", "```text\njust a narrative snippet\n```\n"),
        ]);

        assert!(resolution.findings.is_empty());
        assert!(resolution.drift_candidates.is_empty());
    }

    #[test]
    fn test_block_association_by_declared_name() {
        let resolution = resolve_fixture(&[
            ("src/config.rs", "pub fn parse_config(path: &str) {}\n"),
            (
                "README.md",
                "```rust\npub fn parse_config(path: &str) {}\n```\n",
            ),
        ]);

        assert_eq!(resolution.drift_candidates.len(), 1);
        assert_eq!(
            resolution.drift_candidates[0].symbol.qualified,
            "config::parse_config"
        );
    }

    #[test]
    fn test_url_refs_are_deferred() {
        let resolution = resolve_fixture(&[(
            "README.md",
            "[a](https://example.com/one)\n\n[b](https://example.com/two)\n",
        )]);

        assert!(resolution.findings.is_empty());
        assert_eq!(resolution.url_refs.len(), 2);
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(
            normalize_relative("docs", "./setup.md").as_deref(),
            Some("docs/setup.md")
        );
        assert_eq!(
            normalize_relative("docs/api", "../intro.md").as_deref(),
            Some("docs/intro.md")
        );
        assert_eq!(normalize_relative("", "/docs/a.md").as_deref(), Some("docs/a.md"));
        assert_eq!(normalize_relative("", "../escape.md"), None);
    }
}
