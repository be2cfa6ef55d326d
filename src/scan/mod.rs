//! Scan orchestration
//!
//! Drives the pipeline: index and extract in parallel worker pools, then a
//! pure resolution pass, then drift detection and (when enabled) external
//! link checking, converging in the aggregator. The scan is cancellable;
//! cancellation still emits whatever findings were completed.

use crate::adapter::AdapterRegistry;
use crate::drift::DriftDetector;
use crate::extract::{Document, MarkdownExtractor};
use crate::index::{IgnoreSet, IndexError, RepoIndexer};
use crate::linkcheck::{LinkCheckConfig, LinkChecker, UrlProbe};
use crate::report::{severity_counts, Aggregator, Finding, FindingCategory, SeverityCounts};
use crate::resolve::Resolver;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, shared between the caller and the scan
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; in-flight file work finishes, phases stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A recoverable data-quality problem. Warnings are informational and kept
/// separate from rot findings so callers can distinguish the two channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: String,
    pub message: String,
}

impl ScanWarning {
    pub fn new(path: &str, message: String) -> Self {
        Self {
            path: path.to_string(),
            message,
        }
    }
}

/// Engine input. Tier gating is the caller's concern: the engine simply
/// receives the set of enabled check categories.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extra ignore patterns merged with the built-in set
    pub ignore_patterns: Vec<String>,
    /// Enabled finding categories
    pub categories: BTreeSet<FindingCategory>,
    /// Cap on the number of documents analyzed
    pub max_docs: Option<usize>,
    /// Link checker tuning (used only when `dead-url` is enabled)
    pub link_config: LinkCheckConfig,
}

impl ScanOptions {
    /// The local-only categories: everything except `dead-url`
    pub fn local_categories() -> BTreeSet<FindingCategory> {
        [
            FindingCategory::BrokenLink,
            FindingCategory::StaleSymbol,
            FindingCategory::CodeDrift,
        ]
        .into_iter()
        .collect()
    }

    /// All categories, including the network-backed `dead-url`
    pub fn all_categories() -> BTreeSet<FindingCategory> {
        FindingCategory::ALL.into_iter().collect()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            categories: Self::local_categories(),
            max_docs: None,
            link_config: LinkCheckConfig::default(),
        }
    }
}

/// Result of one scan: the durable findings plus the warning channel
#[derive(Debug)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub warnings: Vec<ScanWarning>,
    /// Number of documents analyzed
    pub docs_scanned: usize,
}

impl ScanReport {
    /// Findings-by-severity counts for the caller's exit policy
    pub fn severity_counts(&self) -> SeverityCounts {
        severity_counts(&self.findings)
    }
}

/// Runs the full pipeline over one repository
pub struct Scanner {
    options: ScanOptions,
    registry: AdapterRegistry,
    cancel: CancelFlag,
    probe: Option<Arc<dyn UrlProbe>>,
}

impl Scanner {
    /// Scanner with the default adapter registry
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            registry: AdapterRegistry::default(),
            cancel: CancelFlag::new(),
            probe: None,
        }
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the URL transport (tests, offline runs)
    pub fn with_probe(mut self, probe: Arc<dyn UrlProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Run the scan. The only fatal error is an unreadable root; everything
    /// else degrades to warnings or findings.
    pub fn scan(&self, root: &Path) -> Result<ScanReport, IndexError> {
        let ignore = IgnoreSet::new(&self.options.ignore_patterns);
        let indexer = RepoIndexer::new(root, ignore, &self.registry);
        let (index, mut warnings) = indexer.index(&self.cancel)?;
        tracing::debug!(
            files = index.file_count(),
            symbols = index.symbol_count(),
            "index built"
        );

        // Extraction is parallel per file; the merge below is single-threaded.
        let mut doc_paths: Vec<String> = index
            .doc_files()
            .filter(|entry| is_markdown(&entry.path))
            .map(|entry| entry.path.clone())
            .collect();
        if let Some(max) = self.options.max_docs {
            doc_paths.truncate(max);
        }

        let extractor = MarkdownExtractor::new(&self.registry);
        let extracted: Vec<(Option<Document>, Option<ScanWarning>)> = doc_paths
            .par_iter()
            .map(|path| {
                if self.cancel.is_cancelled() {
                    return (None, None);
                }
                match std::fs::read_to_string(root.join(path)) {
                    Ok(content) => (Some(extractor.extract(path, &content)), None),
                    Err(err) => (
                        None,
                        Some(ScanWarning::new(path, format!("unreadable: {}", err))),
                    ),
                }
            })
            .collect();

        let mut documents = Vec::new();
        for (document, warning) in extracted {
            documents.extend(document);
            warnings.extend(warning);
        }
        let docs_scanned = documents.len();
        tracing::debug!(docs = docs_scanned, "documents extracted");

        let resolution = Resolver::new(&index, &self.registry, &documents).resolve();

        let mut aggregator = Aggregator::new();
        aggregator.extend(
            resolution
                .findings
                .into_iter()
                .filter(|f| self.options.categories.contains(&f.category))
                .collect(),
        );

        if self.enabled(FindingCategory::CodeDrift) && !self.cancel.is_cancelled() {
            let detector = DriftDetector::new(root, &self.registry);
            let (drift_findings, drift_warnings) = detector.detect(&resolution.drift_candidates);
            aggregator.extend(drift_findings);
            warnings.extend(drift_warnings);
        }

        if self.enabled(FindingCategory::DeadUrl) && !self.cancel.is_cancelled() {
            let checker = match &self.probe {
                Some(probe) => LinkChecker::with_probe(
                    self.options.link_config.clone(),
                    Arc::clone(probe),
                ),
                None => LinkChecker::new(self.options.link_config.clone()),
            };
            // Network trouble is never fatal to the scan
            match checker.check(&resolution.url_refs) {
                Ok(url_findings) => aggregator.extend(url_findings),
                Err(err) => warnings.push(ScanWarning::new("", format!("link check failed: {}", err))),
            }
        }

        Ok(ScanReport {
            findings: aggregator.finish(),
            warnings,
            docs_scanned,
        })
    }

    fn enabled(&self, category: FindingCategory) -> bool {
        self.options.categories.contains(&category)
    }
}

fn is_markdown(path: &str) -> bool {
    matches!(
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str(),
        "md" | "mdx" | "markdown"
    )
}
