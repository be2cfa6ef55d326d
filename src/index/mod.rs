//! Repository indexing
//!
//! Builds an immutable snapshot of the source tree once per scan:
//! - Every non-ignored file becomes a `FileEntry`
//! - Files with a registered language adapter also contribute `SymbolEntry`s
//! - Unreadable files are skipped with a warning; only an unreadable root is fatal

use crate::adapter::AdapterRegistry;
use crate::scan::{CancelFlag, ScanWarning};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal indexing failure
#[derive(Debug, Error)]
pub enum IndexError {
    /// The repository root itself cannot be read. Everything below this
    /// is recoverable and reported as a warning instead.
    #[error("repository root {path:?} is not readable")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse file classification used by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Doc,
    Source,
    Other,
}

/// A single file in the repository snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repository root, forward-slash normalized
    pub path: String,
    /// File classification
    pub kind: FileKind,
    /// SHA-256 of the raw file content
    pub hash: String,
    /// Number of lines in the file
    pub line_count: usize,
}

/// Kind of an indexed symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Function,
    Type,
    Constant,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Module => write!(f, "module"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Type => write!(f, "type"),
            SymbolKind::Constant => write!(f, "constant"),
        }
    }
}

/// A symbol definition extracted by a language adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEntry {
    /// Qualified name in the owning language's notation
    /// (e.g. `config::parse_config` or `pkg.module.func`)
    pub qualified: String,
    /// Defining file, relative to the repository root
    pub path: String,
    /// First line of the definition (1-based)
    pub start_line: usize,
    /// Last line of the definition (1-based, inclusive)
    pub end_line: usize,
    /// Symbol kind
    pub kind: SymbolKind,
}

impl SymbolEntry {
    /// Qualified name split into components, tolerant of both `::` and `.`
    pub fn components(&self) -> Vec<&str> {
        split_components(&self.qualified)
    }

    /// The final (unqualified) name component
    pub fn name(&self) -> &str {
        split_components(&self.qualified).last().copied().unwrap_or("")
    }
}

/// Split a qualified name into components on `::` and `.`
pub fn split_components(qualified: &str) -> Vec<&str> {
    qualified
        .split("::")
        .flat_map(|part| part.split('.'))
        .filter(|part| !part.is_empty())
        .collect()
}

/// Immutable repository snapshot, built once per scan
#[derive(Debug)]
pub struct RepoIndex {
    root: PathBuf,
    files: BTreeMap<String, FileEntry>,
    symbols: BTreeMap<String, SymbolEntry>,
}

impl RepoIndex {
    /// The repository root this index was built from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a file by its normalized relative path
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    /// Whether a file exists in the snapshot
    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// All files, ordered by path
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values()
    }

    /// All documentation files, ordered by path
    pub fn doc_files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values().filter(|f| f.kind == FileKind::Doc)
    }

    /// Exact qualified-name lookup
    pub fn symbol(&self, qualified: &str) -> Option<&SymbolEntry> {
        self.symbols.get(qualified)
    }

    /// All symbols, ordered by qualified name
    pub fn symbols(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.symbols.values()
    }

    /// All symbols whose qualified name ends with the given components
    pub fn symbols_matching_suffix(&self, suffix: &[&str]) -> Vec<&SymbolEntry> {
        if suffix.is_empty() {
            return Vec::new();
        }
        self.symbols
            .values()
            .filter(|entry| {
                let components = entry.components();
                components.len() >= suffix.len()
                    && components[components.len() - suffix.len()..] == *suffix
            })
            .collect()
    }

    /// All symbols with the given unqualified name
    pub fn symbols_named(&self, name: &str) -> Vec<&SymbolEntry> {
        self.symbols
            .values()
            .filter(|entry| entry.name() == name)
            .collect()
    }

    /// Number of indexed files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of indexed symbols
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

/// Ignore-pattern set applied during the walk
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
}

impl IgnoreSet {
    /// Built-in patterns merged with caller-supplied ones
    pub fn new(extra: &[String]) -> Self {
        let mut patterns = vec![
            ".git/**".to_string(),
            "target/**".to_string(),
            "node_modules/**".to_string(),
            "__pycache__/**".to_string(),
            "*.lock".to_string(),
            "*.min.js".to_string(),
        ];
        patterns.extend(extra.iter().cloned());
        Self { patterns }
    }

    /// Check whether a normalized relative path is ignored
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| glob_match(pattern, path))
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Simple glob matching (supports * and **)
fn glob_match(pattern: &str, path: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');
            return (prefix.is_empty() || path.starts_with(prefix))
                && (suffix.is_empty() || path.ends_with(suffix));
        }
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            return path.starts_with(parts[0]) && path.ends_with(parts[1]);
        }
    }

    path == pattern || path.ends_with(&format!("/{}", pattern))
}

/// Compute a stable hash for raw content
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Walks the repository and produces a `RepoIndex`
pub struct RepoIndexer<'a> {
    root: PathBuf,
    ignore: IgnoreSet,
    registry: &'a AdapterRegistry,
}

/// Per-file indexing output, merged single-threaded after the parallel walk
struct FileOutcome {
    entry: Option<FileEntry>,
    symbols: Vec<SymbolEntry>,
    warning: Option<ScanWarning>,
}

impl<'a> RepoIndexer<'a> {
    /// Create an indexer for the given root
    pub fn new<P: AsRef<Path>>(root: P, ignore: IgnoreSet, registry: &'a AdapterRegistry) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ignore,
            registry,
        }
    }

    /// Build the snapshot. Fails only if the root itself is unreadable;
    /// individual file failures degrade to warnings.
    pub fn index(&self, cancel: &CancelFlag) -> Result<(RepoIndex, Vec<ScanWarning>), IndexError> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(IndexError::RootUnreadable {
                    path: self.root.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "not a directory",
                    ),
                });
            }
            Err(source) => {
                return Err(IndexError::RootUnreadable {
                    path: self.root.clone(),
                    source,
                });
            }
        }

        let candidates = self.collect_paths();
        tracing::debug!(files = candidates.len(), "walking repository");

        // Each worker produces its own result; the merge below is the only
        // synchronization point.
        let outcomes: Vec<FileOutcome> = candidates
            .par_iter()
            .map(|rel| {
                if cancel.is_cancelled() {
                    return FileOutcome {
                        entry: None,
                        symbols: Vec::new(),
                        warning: None,
                    };
                }
                self.index_file(rel)
            })
            .collect();

        let mut files = BTreeMap::new();
        let mut symbols: BTreeMap<String, SymbolEntry> = BTreeMap::new();
        let mut warnings = Vec::new();

        for outcome in outcomes {
            if let Some(entry) = outcome.entry {
                files.insert(entry.path.clone(), entry);
            }
            for symbol in outcome.symbols {
                if symbols.contains_key(&symbol.qualified) {
                    tracing::debug!(name = %symbol.qualified, "duplicate qualified name, keeping first");
                    continue;
                }
                symbols.insert(symbol.qualified.clone(), symbol);
            }
            if let Some(warning) = outcome.warning {
                warnings.push(warning);
            }
        }

        Ok((
            RepoIndex {
                root: self.root.clone(),
                files,
                symbols,
            },
            warnings,
        ))
    }

    /// Collect the relative paths of all non-ignored files
    fn collect_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();

        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_str().unwrap_or("");
                e.depth() == 0 || !name.starts_with('.')
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => normalize_slashes(rel),
                Err(_) => continue,
            };
            if self.ignore.matches(&rel) {
                continue;
            }
            paths.push(rel);
        }

        paths.sort();
        paths
    }

    /// Index a single file: entry + best-effort symbols
    fn index_file(&self, rel: &str) -> FileOutcome {
        let full = self.root.join(rel);

        let bytes = match std::fs::read(&full) {
            Ok(bytes) => bytes,
            Err(err) => {
                return FileOutcome {
                    entry: None,
                    symbols: Vec::new(),
                    warning: Some(ScanWarning::new(rel, format!("unreadable: {}", err))),
                };
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let line_count = text.lines().count();
        let kind = classify(rel, self.registry);

        let entry = FileEntry {
            path: rel.to_string(),
            kind,
            hash: content_hash(&bytes),
            line_count,
        };

        let mut warning = None;
        let symbols = if kind == FileKind::Source {
            match self.registry.for_path(rel) {
                Some(adapter) => match adapter.extract_symbols(rel, &text) {
                    Ok(symbols) => symbols,
                    Err(err) => {
                        warning = Some(ScanWarning::new(rel, format!("symbol extraction failed: {}", err)));
                        Vec::new()
                    }
                },
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        FileOutcome {
            entry: Some(entry),
            symbols,
            warning,
        }
    }
}

/// Classify a file by path and adapter coverage
fn classify(path: &str, registry: &AdapterRegistry) -> FileKind {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "md" | "mdx" | "markdown" | "rst" | "adoc" => return FileKind::Doc,
        _ => {}
    }

    if registry.for_path(path).is_some() {
        return FileKind::Source;
    }

    let filename = Path::new(path)
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();
    if matches!(filename.as_str(), "readme" | "changelog" | "contributing") {
        return FileKind::Doc;
    }

    FileKind::Other
}

/// Render a relative path with forward slashes
fn normalize_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterRegistry;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_index_basic_tree() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "README.md", "# Hello\n");
        write(tmp.path(), "src/lib.rs", "pub fn greet() {}\n");
        write(tmp.path(), "assets/logo.bin", "xx");

        let registry = AdapterRegistry::default();
        let indexer = RepoIndexer::new(tmp.path(), IgnoreSet::default(), &registry);
        let (index, warnings) = indexer.index(&CancelFlag::new()).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(index.file("README.md").unwrap().kind, FileKind::Doc);
        assert_eq!(index.file("src/lib.rs").unwrap().kind, FileKind::Source);
        assert_eq!(index.file("assets/logo.bin").unwrap().kind, FileKind::Other);
        assert!(index.symbol("greet").is_some());
    }

    #[test]
    fn test_ignored_files_are_absent() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "docs/guide.md", "# Guide\n");
        write(tmp.path(), "target/out.md", "# Build artifact\n");

        let registry = AdapterRegistry::default();
        let indexer = RepoIndexer::new(tmp.path(), IgnoreSet::default(), &registry);
        let (index, _) = indexer.index(&CancelFlag::new()).unwrap();

        assert!(index.contains_file("docs/guide.md"));
        assert!(!index.contains_file("target/out.md"));
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let registry = AdapterRegistry::default();
        let indexer = RepoIndexer::new("/does/not/exist", IgnoreSet::default(), &registry);
        let err = indexer.index(&CancelFlag::new()).unwrap_err();
        assert!(matches!(err, IndexError::RootUnreadable { .. }));
    }

    #[test]
    fn test_suffix_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "src/config.rs", "pub fn parse_config() {}\n");

        let registry = AdapterRegistry::default();
        let indexer = RepoIndexer::new(tmp.path(), IgnoreSet::default(), &registry);
        let (index, _) = indexer.index(&CancelFlag::new()).unwrap();

        let hits = index.symbols_matching_suffix(&["parse_config"]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/config.rs");
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.md", "README.md"));
        assert!(glob_match("docs/**/*.md", "docs/api/guide.md"));
        assert!(!glob_match("*.rs", "README.md"));
    }
}
