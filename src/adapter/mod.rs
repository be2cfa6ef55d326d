//! Language adapter registry
//!
//! Pluggable per-file-type logic, selected by extension at index time.
//! Each adapter knows how to:
//! - Extract qualified symbol definitions from a source file
//! - Tokenize code for drift comparison (whitespace and comments stripped)
//! - Recognize import-like statements in documentation code blocks
//! - List declared names for code-block association

pub mod python;
pub mod rust;

pub use python::PythonAdapter;
pub use rust::RustAdapter;

use crate::index::SymbolEntry;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

/// Kind of a drift-comparison token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    /// Identifier (excluding language keywords)
    Ident,
    /// Language keyword
    Keyword,
    /// String, character, or numeric literal
    Literal,
    /// Operator or punctuation character
    Punct,
}

/// A single token in a drift-comparison stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// An import-like reference found in a code snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// The referenced qualified name, in the language's own notation
    pub token: String,
    /// Zero-based line offset within the snippet
    pub line_offset: usize,
}

/// Per-language extraction and tokenization capability
pub trait LanguageAdapter: Send + Sync {
    /// Adapter name (matches the common fence tag)
    fn name(&self) -> &'static str;

    /// File extensions this adapter claims
    fn extensions(&self) -> &'static [&'static str];

    /// Fence language tags this adapter claims
    fn language_tags(&self) -> &'static [&'static str];

    /// Extract top-level symbol definitions from a source file.
    /// Best-effort: adapters report what they can address, not a full parse.
    fn extract_symbols(&self, path: &str, content: &str) -> Result<Vec<SymbolEntry>>;

    /// Tokenize code for drift comparison
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Import-like statements in a documentation code snippet
    fn import_references(&self, text: &str) -> Vec<ImportRef>;

    /// Names declared in a code snippet, used to associate blocks to symbols
    fn declared_names(&self, text: &str) -> Vec<String>;
}

/// Extension-keyed adapter registry
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn LanguageAdapter>>,
    by_extension: HashMap<&'static str, usize>,
    by_tag: HashMap<&'static str, usize>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
            by_extension: HashMap::new(),
            by_tag: HashMap::new(),
        }
    }

    /// Register an adapter for its claimed extensions and tags
    pub fn register(&mut self, adapter: Box<dyn LanguageAdapter>) {
        let idx = self.adapters.len();
        for ext in adapter.extensions() {
            self.by_extension.insert(ext, idx);
        }
        for tag in adapter.language_tags() {
            self.by_tag.insert(tag, idx);
        }
        self.adapters.push(adapter);
    }

    /// Adapter for a file extension
    pub fn for_extension(&self, ext: &str) -> Option<&dyn LanguageAdapter> {
        self.by_extension
            .get(ext.to_lowercase().as_str())
            .map(|&idx| self.adapters[idx].as_ref())
    }

    /// Adapter for a file path (by extension)
    pub fn for_path(&self, path: &str) -> Option<&dyn LanguageAdapter> {
        let ext = Path::new(path).extension().and_then(|e| e.to_str())?;
        self.for_extension(ext)
    }

    /// Adapter for a fence language tag
    pub fn for_tag(&self, tag: &str) -> Option<&dyn LanguageAdapter> {
        self.by_tag
            .get(tag.to_lowercase().as_str())
            .map(|&idx| self.adapters[idx].as_ref())
    }

    /// All registered adapters
    pub fn all(&self) -> impl Iterator<Item = &dyn LanguageAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(RustAdapter));
        registry.register(Box::new(PythonAdapter));
        registry
    }
}

/// Shared lexer behind the per-language tokenizers.
///
/// Strips whitespace and comments, groups string/char/numeric literals,
/// and tags identifiers against the language's keyword set. Everything
/// else becomes single-character punctuation tokens.
pub(crate) fn tokenize_with(
    text: &str,
    line_comments: &[&str],
    block_comment: Option<(&str, &str)>,
    triple_quoted: bool,
    keywords: &[&str],
) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    'outer: while i < bytes.len() {
        let rest = &text[i..];
        let c = rest.chars().next().unwrap_or('\0');

        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }

        for prefix in line_comments {
            if rest.starts_with(prefix) {
                let end = rest.find('\n').map(|p| i + p).unwrap_or(bytes.len());
                i = end;
                continue 'outer;
            }
        }

        if let Some((open, close)) = block_comment {
            if rest.starts_with(open) {
                let end = rest[open.len()..]
                    .find(close)
                    .map(|p| i + open.len() + p + close.len())
                    .unwrap_or(bytes.len());
                i = end;
                continue;
            }
        }

        if triple_quoted {
            let quote = if rest.starts_with("\"\"\"") {
                Some("\"\"\"")
            } else if rest.starts_with("'''") {
                Some("'''")
            } else {
                None
            };
            if let Some(quote) = quote {
                let end = rest[quote.len()..]
                    .find(quote)
                    .map(|p| i + quote.len() + p + quote.len())
                    .unwrap_or(bytes.len());
                tokens.push(Token::new(TokenKind::Literal, &text[i..end]));
                i = end;
                continue;
            }
        }

        if c == '"' || c == '\'' {
            let mut len = c.len_utf8();
            let mut escaped = false;
            for ch in rest[c.len_utf8()..].chars() {
                len += ch.len_utf8();
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == c {
                    break;
                }
            }
            tokens.push(Token::new(TokenKind::Literal, &text[i..i + len]));
            i += len;
            continue;
        }

        if c.is_ascii_digit() {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Literal, &rest[..len]));
            i += len;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            let word = &rest[..len];
            let kind = if keywords.contains(&word) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            tokens.push(Token::new(kind, word));
            i += len;
            continue;
        }

        tokens.push(Token::new(TokenKind::Punct, &rest[..c.len_utf8()]));
        i += c.len_utf8();
    }

    tokens
}

/// Derive module-path components from a repo-relative file path.
///
/// Components after the last `src` directory are kept; the extension and
/// crate-root stems (`lib`, `main`, `mod`, `__init__`) are dropped.
pub(crate) fn module_components(path: &str, root_stems: &[&str]) -> Vec<String> {
    let no_ext = match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    };

    let mut components: Vec<&str> = no_ext.split('/').filter(|c| !c.is_empty()).collect();
    if let Some(pos) = components.iter().rposition(|c| *c == "src") {
        components.drain(..=pos);
    }
    if let Some(last) = components.last() {
        if root_stems.contains(last) {
            components.pop();
        }
    }

    components.into_iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = AdapterRegistry::default();
        assert_eq!(registry.for_extension("rs").unwrap().name(), "rust");
        assert_eq!(registry.for_path("src/app.py").unwrap().name(), "python");
        assert_eq!(registry.for_tag("python").unwrap().name(), "python");
        assert!(registry.for_extension("zig").is_none());
    }

    #[test]
    fn test_tokenizer_strips_comments_and_whitespace() {
        let tokens = tokenize_with(
            "let x = 1; // trailing\n/* block */ let y = 2;",
            &["//"],
            Some(("/*", "*/")),
            false,
            &["let"],
        );
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["let", "x", "=", "1", ";", "let", "y", "=", "2", ";"]);
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[3].kind, TokenKind::Literal);
    }

    #[test]
    fn test_string_literals_are_single_tokens() {
        let tokens = tokenize_with(r#"print("a // not comment")"#, &["//"], None, false, &[]);
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2].kind, TokenKind::Literal);
        assert_eq!(tokens[2].text, "\"a // not comment\"");
    }

    #[test]
    fn test_module_components() {
        assert_eq!(
            module_components("src/config.rs", &["lib", "main", "mod"]),
            vec!["config"]
        );
        assert!(module_components("src/lib.rs", &["lib", "main", "mod"]).is_empty());
        assert_eq!(
            module_components("src/repo/mod.rs", &["lib", "main", "mod"]),
            vec!["repo"]
        );
        assert_eq!(
            module_components("pkg/util/__init__.py", &["__init__"]),
            vec!["pkg", "util"]
        );
    }
}
