//! Documentation extraction
//!
//! Parses each documentation file into a `Document` holding its
//! referenceable artifacts:
//! - Links (relative, anchor-only, absolute — distinguished by syntax)
//! - Code blocks (language tag and raw text preserved verbatim)
//! - Symbol references (import heuristics, code blocks and inline code only)
//! - Headings, normalized to anchor slugs

pub mod markdown;

pub use markdown::MarkdownExtractor;

use serde::{Deserialize, Serialize};

/// Where a link points, classified by syntax alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    /// Relative path, optionally with an anchor (`./setup.md#install`)
    Relative {
        path: String,
        anchor: Option<String>,
    },
    /// Same-document anchor (`#install`)
    AnchorOnly { anchor: String },
    /// Absolute URL (`https://...`)
    Absolute { url: String },
}

/// A link extracted from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub target: LinkTarget,
    /// 1-based line in the originating document
    pub line: usize,
}

/// A symbol token extracted from import-like syntax
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolReference {
    pub token: String,
    /// 1-based line in the originating document
    pub line: usize,
}

/// Explicit source-location annotation on a code fence
/// (` ```rust source=src/config.rs#parse_config `)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHint {
    pub path: String,
    pub symbol: Option<String>,
}

/// A fenced code block extracted from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Declared language tag, if any
    pub language: Option<String>,
    /// Raw text, verbatim
    pub text: String,
    /// First line of the block content (1-based)
    pub start_line: usize,
    /// Last line of the block content (1-based)
    pub end_line: usize,
    /// Explicit source annotation, if declared
    pub hint: Option<SourceHint>,
}

/// A document heading with its normalized anchor slug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    pub text: String,
    pub slug: String,
    pub line: usize,
}

/// One documentation file's extracted artifacts.
/// Produced by the extractor, consumed read-only downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Path relative to the repository root
    pub path: String,
    pub links: Vec<Link>,
    pub symbol_refs: Vec<SymbolReference>,
    pub code_blocks: Vec<CodeBlock>,
    pub headings: Vec<Heading>,
}

impl Document {
    /// Whether any heading normalizes to the given anchor
    pub fn has_anchor(&self, anchor: &str) -> bool {
        let wanted = slugify(anchor);
        self.headings.iter().any(|h| h.slug == wanted)
    }
}

/// Normalize a heading (or anchor) to its slug: lowercase,
/// punctuation stripped, spaces to hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            slug.push('-');
        } else if c == '_' {
            slug.push('_');
        }
    }
    slug
}

/// Classify a raw href by syntax. Returns `None` for targets the engine
/// does not check (mailto, tel, non-http schemes).
pub(crate) fn classify_href(href: &str) -> Option<LinkTarget> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(LinkTarget::Absolute {
            url: href.to_string(),
        });
    }
    if let Some(anchor) = href.strip_prefix('#') {
        return Some(LinkTarget::AnchorOnly {
            anchor: anchor.to_string(),
        });
    }
    if href.contains("://") || href.starts_with("mailto:") || href.starts_with("tel:") {
        return None;
    }

    let (path, anchor) = match href.split_once('#') {
        Some((path, anchor)) => (path, Some(anchor.to_string())),
        None => (href, None),
    };
    let path = path.split('?').next().unwrap_or("");
    if path.is_empty() {
        return anchor.map(|anchor| LinkTarget::AnchorOnly { anchor });
    }

    Some(LinkTarget::Relative {
        path: path.to_string(),
        anchor,
    })
}
