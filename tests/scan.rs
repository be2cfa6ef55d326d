//! End-to-end scans over fixture repositories

use async_trait::async_trait;
use docrot::linkcheck::{ProbeOutcome, UrlProbe};
use docrot::report::{to_json, to_sarif_json, FindingCategory, Severity};
use docrot::scan::{ScanOptions, Scanner};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

struct StaticProbe {
    status: u16,
}

#[async_trait]
impl UrlProbe for StaticProbe {
    async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        ProbeOutcome::Status(self.status)
    }
}

#[test]
fn anchor_missing_in_existing_file() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "guide.md", "Read the [setup](./setup.md#install) first.\n");
    write(tmp.path(), "setup.md", "# Getting Started\n\nNo install heading here.\n");

    let report = Scanner::new(ScanOptions::default()).scan(tmp.path()).unwrap();

    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.category, FindingCategory::BrokenLink);
    assert_eq!(finding.file, "guide.md");
    assert_eq!(finding.line, 1);
    assert!(finding.message.contains("anchor not found"));
}

#[test]
fn hinted_code_block_with_new_parameter_is_major_drift() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "src/config.rs",
        "pub fn parse_config(path: &str, strict: bool) -> u32 {\n    0\n}\n",
    );
    write(
        tmp.path(),
        "README.md",
        "# Config\n\n```rust source=src/config.rs#parse_config\npub fn parse_config(path: &str) -> u32 {\n    0\n}\n```\n",
    );

    let report = Scanner::new(ScanOptions::default()).scan(tmp.path()).unwrap();

    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.category, FindingCategory::CodeDrift);
    assert_eq!(finding.severity, Severity::High);
    assert!(finding.message.contains("parameter list changed"));
    assert_eq!(finding.file, "README.md");
}

#[test]
fn stale_symbol_after_rename() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "src/loader.rs", "pub fn load_settings() {}\n");
    write(
        tmp.path(),
        "README.md",
        "```rust\nuse loader::parse_settings;\n```\n",
    );

    let report = Scanner::new(ScanOptions::default()).scan(tmp.path()).unwrap();

    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.category, FindingCategory::StaleSymbol);
    assert!(finding.message.contains("not found"));
}

#[test]
fn dead_url_404_is_reported_per_location() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "docs/a.md",
        "[old](https://example.com/old-page)\n",
    );
    write(
        tmp.path(),
        "docs/b.md",
        "[old](https://example.com/old-page)\n",
    );

    let options = ScanOptions {
        categories: ScanOptions::all_categories(),
        ..Default::default()
    };
    let report = Scanner::new(options)
        .with_probe(Arc::new(StaticProbe { status: 404 }))
        .scan(tmp.path())
        .unwrap();

    assert_eq!(report.findings.len(), 2);
    for finding in &report.findings {
        assert_eq!(finding.category, FindingCategory::DeadUrl);
        assert!(finding.message.contains("404"));
    }
    assert_ne!(report.findings[0].fingerprint, report.findings[1].fingerprint);
}

#[test]
fn live_urls_produce_no_findings() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "README.md", "[site](https://example.com)\n");

    let options = ScanOptions {
        categories: ScanOptions::all_categories(),
        ..Default::default()
    };
    let report = Scanner::new(options)
        .with_probe(Arc::new(StaticProbe { status: 200 }))
        .scan(tmp.path())
        .unwrap();

    assert!(report.findings.is_empty());
}

#[test]
fn repeated_scans_are_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "docs/guide.md",
        "# Guide\n\n[gone](missing.md)\n\n```rust\nuse app::run;\n```\n",
    );
    write(tmp.path(), "src/lib.rs", "pub fn other() {}\n");

    let scanner = Scanner::new(ScanOptions::default());
    let first = scanner.scan(tmp.path()).unwrap();
    let second = scanner.scan(tmp.path()).unwrap();

    assert_eq!(
        to_json(&first.findings).unwrap(),
        to_json(&second.findings).unwrap()
    );
    assert_eq!(
        to_sarif_json(&first.findings).unwrap(),
        to_sarif_json(&second.findings).unwrap()
    );
}

#[test]
fn malformed_source_is_tolerated() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "README.md", "# Clean\n");
    // Invalid UTF-8 in a source file the indexer will still hash and count
    std::fs::write(tmp.path().join("blob.rs"), b"fn ok() {}\n\xff\xfe").unwrap();

    let report = Scanner::new(ScanOptions::default()).scan(tmp.path()).unwrap();
    assert!(report.findings.is_empty());
}

#[test]
fn ignored_directories_are_not_link_targets() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "README.md", "[build](target/notes.md)\n");
    write(tmp.path(), "target/notes.md", "# Build notes\n");

    let report = Scanner::new(ScanOptions::default()).scan(tmp.path()).unwrap();

    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].category, FindingCategory::BrokenLink);
}
