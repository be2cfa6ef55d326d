//! Command implementations

use super::{OutputFormat, ScanArgs, SymbolsArgs};
use crate::config::DocrotConfig;
use crate::index::{IgnoreSet, RepoIndexer};
use crate::report;
use crate::scan::{CancelFlag, ScanOptions, Scanner};
use anyhow::Result;
use std::path::Path;

/// Run a scan and print the report. Returns the process exit code:
/// 0 for a clean scan, 1 when findings are present.
pub fn scan(args: &ScanArgs, format: OutputFormat) -> Result<i32> {
    let root = Path::new(&args.path);
    let config = DocrotConfig::load_or_default(root)?;

    let mut link_config = config.link_check_config();
    if let Some(timeout) = args.timeout {
        link_config.request_timeout = std::time::Duration::from_secs(timeout);
    }
    if let Some(retries) = args.retries {
        link_config.max_retries = retries;
    }
    if let Some(concurrency) = args.concurrency {
        link_config.concurrency = concurrency;
    }

    let check_urls = args.check_urls || config.check_urls;
    let categories = if check_urls {
        ScanOptions::all_categories()
    } else {
        ScanOptions::local_categories()
    };

    let max_docs = args
        .max_docs
        .or(if config.max_docs > 0 { Some(config.max_docs) } else { None })
        .filter(|&n| n > 0);

    let mut ignore_patterns = config.ignore.clone();
    ignore_patterns.extend(args.ignore_patterns.iter().cloned());

    let options = ScanOptions {
        ignore_patterns,
        categories,
        max_docs,
        link_config,
    };

    let report = Scanner::new(options)
        .with_cancel(CancelFlag::new())
        .scan(root)?;

    for warning in &report.warnings {
        if warning.path.is_empty() {
            eprintln!("warning: {}", warning.message);
        } else {
            eprintln!("warning: {}: {}", warning.path, warning.message);
        }
    }

    match format {
        OutputFormat::Text => print!("{}", report::render_text(&report.findings, report.docs_scanned)),
        OutputFormat::Json => println!("{}", report::to_json(&report.findings)?),
        OutputFormat::Sarif => println!("{}", report::to_sarif_json(&report.findings)?),
    }

    Ok(if report.findings.is_empty() { 0 } else { 1 })
}

/// Print the symbol table the indexer would build
pub fn symbols(args: &SymbolsArgs) -> Result<()> {
    let root = Path::new(&args.path);
    let registry = crate::adapter::AdapterRegistry::default();
    let ignore = IgnoreSet::new(&args.ignore_patterns);

    let (index, warnings) = RepoIndexer::new(root, ignore, &registry).index(&CancelFlag::new())?;

    for warning in &warnings {
        eprintln!("warning: {}: {}", warning.path, warning.message);
    }

    println!(
        "{} files, {} symbols",
        index.file_count(),
        index.symbol_count()
    );
    for file in index.files() {
        let file_symbols: Vec<_> = index
            .symbols()
            .filter(|s| s.path == file.path)
            .collect();
        if file_symbols.is_empty() {
            continue;
        }
        println!("\n{}", file.path);
        for symbol in file_symbols {
            println!(
                "  {}  {} (lines {}-{})",
                symbol.kind, symbol.qualified, symbol.start_line, symbol.end_line
            );
        }
    }

    Ok(())
}
