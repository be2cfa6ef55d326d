//! Structural drift detection
//!
//! Compares documented code examples against their current source location
//! over a normalized token stream: whitespace and comments are stripped by
//! the owning adapter's tokenizer, so only identifiers, literals, and
//! punctuation participate. This is a heuristic structural comparison, not
//! a parser-level equivalence check.

use crate::adapter::{AdapterRegistry, Token, TokenKind};
use crate::report::{Finding, FindingCategory, Severity};
use crate::resolve::DriftCandidate;
use crate::scan::ScanWarning;
use rayon::prelude::*;
use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Classification of one block/source comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftClass {
    /// Token streams match after normalization
    Identical,
    /// Only literal values differ
    Minor,
    /// Identifier set, statements, or signature changed
    Major { reasons: Vec<String> },
}

/// Compares associated code blocks to current source
pub struct DriftDetector<'a> {
    root: PathBuf,
    registry: &'a AdapterRegistry,
}

impl<'a> DriftDetector<'a> {
    /// Create a detector reading source from the given repository root
    pub fn new<P: AsRef<Path>>(root: P, registry: &'a AdapterRegistry) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            registry,
        }
    }

    /// Check every candidate; source read failures become warnings
    pub fn detect(&self, candidates: &[DriftCandidate]) -> (Vec<Finding>, Vec<ScanWarning>) {
        let outcomes: Vec<(Option<Finding>, Option<ScanWarning>)> = candidates
            .par_iter()
            .map(|candidate| self.check(candidate))
            .collect();

        let mut findings = Vec::new();
        let mut warnings = Vec::new();
        for (finding, warning) in outcomes {
            findings.extend(finding);
            warnings.extend(warning);
        }
        (findings, warnings)
    }

    fn check(&self, candidate: &DriftCandidate) -> (Option<Finding>, Option<ScanWarning>) {
        let symbol = &candidate.symbol;

        let Some(adapter) = self.registry.for_path(&symbol.path) else {
            // Whole-file hints can point at files no adapter can tokenize
            return (None, None);
        };

        let source = match std::fs::read_to_string(self.root.join(&symbol.path)) {
            Ok(source) => source,
            Err(err) => {
                return (
                    None,
                    Some(ScanWarning::new(
                        &symbol.path,
                        format!("source unreadable during drift check: {}", err),
                    )),
                );
            }
        };

        let snippet = source_slice(&source, symbol.start_line, symbol.end_line);
        let block_tokens = adapter.tokenize(&candidate.block.text);
        let source_tokens = adapter.tokenize(&snippet);

        let finding = match classify(&block_tokens, &source_tokens) {
            DriftClass::Identical => None,
            DriftClass::Minor => Some(Finding::new(
                FindingCategory::CodeDrift,
                Severity::Low,
                &candidate.file,
                candidate.block.start_line,
                format!("Code drift in {}: literal values changed", symbol.qualified),
                &symbol.qualified,
            )),
            DriftClass::Major { reasons } => Some(Finding::new(
                FindingCategory::CodeDrift,
                Severity::High,
                &candidate.file,
                candidate.block.start_line,
                format!("Code drift in {}: {}", symbol.qualified, reasons.join("; ")),
                &symbol.qualified,
            )),
        };

        (finding, None)
    }
}

/// Lines `start..=end` of a source file (1-based, clamped)
fn source_slice(source: &str, start: usize, end: usize) -> String {
    source
        .lines()
        .skip(start.saturating_sub(1))
        .take(end.saturating_sub(start) + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classify the delta between two token streams.
///
/// Pure over its inputs, so re-running on unchanged pairs always yields the
/// same classification.
pub fn classify(block: &[Token], source: &[Token]) -> DriftClass {
    let ops = capture_diff_slices(Algorithm::Myers, block, source);

    if ops
        .iter()
        .all(|op| matches!(op, DiffOp::Equal { .. }))
    {
        return DriftClass::Identical;
    }

    let mut literal_only = true;
    for op in &ops {
        match op {
            DiffOp::Equal { .. } => {}
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } if old_len == new_len => {
                for offset in 0..*old_len {
                    let old = &block[old_index + offset];
                    let new = &source[new_index + offset];
                    if old.kind != TokenKind::Literal || new.kind != TokenKind::Literal {
                        literal_only = false;
                    }
                }
            }
            _ => literal_only = false,
        }
    }

    if literal_only {
        return DriftClass::Minor;
    }

    let mut reasons = Vec::new();

    if signatures_differ(block, source) {
        reasons.push("parameter list changed".to_string());
    }

    let block_idents = ident_set(block);
    let source_idents = ident_set(source);
    let added: Vec<&str> = source_idents.difference(&block_idents).copied().collect();
    let removed: Vec<&str> = block_idents.difference(&source_idents).copied().collect();
    if !added.is_empty() {
        reasons.push(format!("identifiers added: {}", preview(&added)));
    }
    if !removed.is_empty() {
        reasons.push(format!("identifiers removed: {}", preview(&removed)));
    }

    if reasons.is_empty() {
        reasons.push("statements added or removed".to_string());
    }

    DriftClass::Major { reasons }
}

/// Tokens of the first parenthesized parameter list, if any
fn signature_tokens(tokens: &[Token]) -> Option<&[Token]> {
    let open = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Punct && t.text == "(")?;

    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.kind != TokenKind::Punct {
            continue;
        }
        match token.text.as_str() {
            "(" => depth += 1,
            ")" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&tokens[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn signatures_differ(block: &[Token], source: &[Token]) -> bool {
    match (signature_tokens(block), signature_tokens(source)) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

fn ident_set(tokens: &[Token]) -> BTreeSet<&str> {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Ident)
        .map(|t| t.text.as_str())
        .collect()
}

/// Sorted, bounded list for human messages
fn preview(names: &[&str]) -> String {
    const LIMIT: usize = 4;
    let mut sorted: Vec<&str> = names.to_vec();
    sorted.sort_unstable();
    if sorted.len() > LIMIT {
        format!("{}, ...", sorted[..LIMIT].join(", "))
    } else {
        sorted.join(", ")
    }
}
