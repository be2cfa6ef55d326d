//! Finding aggregation and report serialization
//!
//! Findings are the only entity crossing into the report: append-only
//! aggregation, one dedupe pass keyed by fingerprint, then a deterministic
//! ordering so repeated runs against unchanged input are byte-identical.

pub mod sarif;

pub use sarif::to_sarif_json;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category of a rot finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    BrokenLink,
    StaleSymbol,
    CodeDrift,
    DeadUrl,
}

impl FindingCategory {
    /// All categories, in reporting order
    pub const ALL: [FindingCategory; 4] = [
        FindingCategory::BrokenLink,
        FindingCategory::StaleSymbol,
        FindingCategory::CodeDrift,
        FindingCategory::DeadUrl,
    ];
}

impl std::fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingCategory::BrokenLink => write!(f, "broken-link"),
            FindingCategory::StaleSymbol => write!(f, "stale-symbol"),
            FindingCategory::CodeDrift => write!(f, "code-drift"),
            FindingCategory::DeadUrl => write!(f, "dead-url"),
        }
    }
}

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// A reported instance of documentation diverging from repository reality
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: FindingCategory,
    pub severity: Severity,
    /// Originating document, relative to the repository root
    pub file: String,
    /// 1-based line in the originating document
    pub line: usize,
    pub message: String,
    /// Stable identity hash used for deduplication and suppression
    pub fingerprint: String,
}

impl Finding {
    /// Create a finding; the fingerprint is derived from category,
    /// location, and target.
    pub fn new(
        category: FindingCategory,
        severity: Severity,
        file: &str,
        line: usize,
        message: String,
        target: &str,
    ) -> Self {
        Self {
            category,
            severity,
            file: file.to_string(),
            line,
            message,
            fingerprint: fingerprint_for(category, file, line, target),
        }
    }
}

/// Compute a stable SHA-256 fingerprint for a finding.
///
/// Identity fields: category, document path (repo-relative), line, and the
/// referenced target. No timestamps and no absolute paths, so fingerprints
/// survive across runs and machines.
pub fn fingerprint_for(category: FindingCategory, file: &str, line: usize, target: &str) -> String {
    let canonical = format!("{}|{}|{}|{}", category, file, line, target);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Findings-by-severity counts, consumed by the CLI shell's exit policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    /// Total number of findings
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Count findings per severity
pub fn severity_counts(findings: &[Finding]) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    for finding in findings {
        match finding.severity {
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
        }
    }
    counts
}

/// Merges verdicts into the canonical finding list
#[derive(Debug, Default)]
pub struct Aggregator {
    findings: Vec<Finding>,
}

impl Aggregator {
    /// Empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append findings from one verdict source
    pub fn extend(&mut self, findings: Vec<Finding>) {
        self.findings.extend(findings);
    }

    /// Dedupe exact fingerprints and order deterministically by
    /// (document path, line, category, fingerprint).
    pub fn finish(mut self) -> Vec<Finding> {
        self.findings.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then(a.line.cmp(&b.line))
                .then(a.category.cmp(&b.category))
                .then(a.fingerprint.cmp(&b.fingerprint))
        });
        self.findings
            .dedup_by(|a, b| a.fingerprint == b.fingerprint);
        self.findings
    }
}

/// Serialize findings to the stable JSON report shape
pub fn to_json(findings: &[Finding]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(findings)?)
}

/// Render the human-readable text report
pub fn render_text(findings: &[Finding], docs_scanned: usize) -> String {
    if findings.is_empty() {
        return format!("✓ Scanned {} docs, no rot detected\n", docs_scanned);
    }

    let counts = severity_counts(findings);
    let mut out = format!(
        "DocRot report: {} finding(s) in {} docs\n\n",
        findings.len(),
        docs_scanned
    );

    for finding in findings {
        out.push_str(&format!(
            "  {}:{}  [{}/{}] {}\n",
            finding.file, finding.line, finding.category, finding.severity, finding.message
        ));
    }

    out.push_str(&format!(
        "\n{} high, {} medium, {} low\n",
        counts.high, counts.medium, counts.low
    ));
    out
}
