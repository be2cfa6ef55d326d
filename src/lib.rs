//! DocRot - Documentation rot detection engine
//!
//! This library provides the core functionality for detecting when
//! documentation diverges from repository reality: broken links, references
//! to removed or renamed symbols, code examples that drifted from the source
//! they illustrate, and dead external URLs.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod drift;
pub mod extract;
pub mod index;
pub mod linkcheck;
pub mod report;
pub mod resolve;
pub mod scan;

/// Re-export commonly used types
pub use index::{RepoIndex, RepoIndexer};
pub use report::{Finding, FindingCategory, Severity};
pub use scan::{CancelFlag, ScanOptions, ScanReport, Scanner};

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "docrot";
