//! Markdown artifact extraction using pulldown-cmark
//!
//! Extraction never fails: malformed constructs degrade to "not extracted"
//! because documentation authoring is expected to be imperfect.

use super::{classify_href, slugify, CodeBlock, Document, Heading, Link, SourceHint, SymbolReference};
use crate::adapter::AdapterRegistry;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// Extracts artifacts from Markdown documents
pub struct MarkdownExtractor<'a> {
    registry: &'a AdapterRegistry,
}

impl<'a> MarkdownExtractor<'a> {
    /// Create an extractor backed by the given adapter registry
    pub fn new(registry: &'a AdapterRegistry) -> Self {
        Self { registry }
    }

    /// Extract every artifact from one document
    pub fn extract(&self, path: &str, content: &str) -> Document {
        let mut doc = Document {
            path: path.to_string(),
            ..Default::default()
        };

        let line_starts = line_starts(content);
        let line_of = |offset: usize| line_starts.partition_point(|&start| start <= offset);

        let mut in_heading = false;
        let mut heading_text = String::new();
        let mut heading_line = 0;

        let mut in_code_block = false;
        let mut code_text = String::new();
        let mut code_lang: Option<String> = None;
        let mut code_hint: Option<SourceHint> = None;
        let mut code_start_line = 0;

        for (event, range) in Parser::new(content).into_offset_iter() {
            match event {
                Event::Start(Tag::Link { dest_url, .. }) | Event::Start(Tag::Image { dest_url, .. }) => {
                    if let Some(target) = classify_href(&dest_url) {
                        doc.links.push(Link {
                            target,
                            line: line_of(range.start),
                        });
                    }
                }

                Event::Start(Tag::Heading { .. }) => {
                    in_heading = true;
                    heading_text.clear();
                    heading_line = line_of(range.start);
                }
                Event::End(TagEnd::Heading(_)) => {
                    in_heading = false;
                    doc.headings.push(Heading {
                        slug: slugify(&heading_text),
                        text: heading_text.clone(),
                        line: heading_line,
                    });
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_text.clear();
                    let (lang, hint) = match kind {
                        CodeBlockKind::Fenced(info) => parse_fence_info(&info),
                        CodeBlockKind::Indented => (None, None),
                    };
                    code_lang = lang;
                    code_hint = hint;
                    // Content begins on the line after the opening fence
                    code_start_line = line_of(range.start) + 1;
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let line_count = code_text.lines().count();
                    let end_line = code_start_line + line_count.saturating_sub(1);

                    self.collect_imports(&mut doc, &code_text, code_lang.as_deref(), code_start_line);

                    doc.code_blocks.push(CodeBlock {
                        language: code_lang.take(),
                        text: code_text.clone(),
                        start_line: code_start_line,
                        end_line,
                        hint: code_hint.take(),
                    });
                }

                Event::Text(text) => {
                    if in_heading {
                        heading_text.push_str(&text);
                    } else if in_code_block {
                        code_text.push_str(&text);
                    }
                }
                Event::Code(code) => {
                    if in_heading {
                        heading_text.push_str(&code);
                    } else if let Some(token) = inline_symbol_token(&code) {
                        doc.symbol_refs.push(SymbolReference {
                            token,
                            line: line_of(range.start),
                        });
                    }
                }

                _ => {}
            }
        }

        doc
    }

    /// Apply import heuristics to a code block. A declared language tag
    /// selects one adapter; untagged blocks try every registered heuristic.
    fn collect_imports(
        &self,
        doc: &mut Document,
        text: &str,
        language: Option<&str>,
        start_line: usize,
    ) {
        let refs = match language {
            Some(tag) => match self.registry.for_tag(tag) {
                Some(adapter) => adapter.import_references(text),
                None => Vec::new(),
            },
            None => self
                .registry
                .all()
                .flat_map(|adapter| adapter.import_references(text))
                .collect(),
        };

        for import in refs {
            doc.symbol_refs.push(SymbolReference {
                token: import.token,
                line: start_line + import.line_offset,
            });
        }
    }
}

/// Byte offsets at which each line starts
fn line_starts(content: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Parse a fence info string: language tag plus optional
/// `source=<path>[#<symbol>]` annotation.
fn parse_fence_info(info: &str) -> (Option<String>, Option<SourceHint>) {
    let mut language = None;
    let mut hint = None;

    for (i, word) in info.split_whitespace().enumerate() {
        if let Some(value) = word.strip_prefix("source=") {
            let (path, symbol) = match value.split_once('#') {
                Some((path, symbol)) => (path, Some(symbol.to_string())),
                None => (value, None),
            };
            hint = Some(SourceHint {
                path: path.to_string(),
                symbol,
            });
        } else if i == 0 && !word.contains('=') {
            language = Some(word.to_string());
        }
    }

    (language, hint)
}

/// An inline code span counts as a symbol reference only when it forms a
/// `::`-qualified path; bare words in prose are too noisy to check.
fn inline_symbol_token(code: &str) -> Option<String> {
    let token = code.trim().trim_end_matches("()");
    if !token.contains("::") || token.starts_with(':') || token.ends_with(':') {
        return None;
    }
    if !token
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == ':')
    {
        return None;
    }
    Some(token.to_string())
}
