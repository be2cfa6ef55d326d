//! CLI interface using clap
//!
//! A thin shell over the engine: flag parsing, tier gating, and the exit
//! policy live here, never in the scan pipeline.

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// DocRot - Documentation rot detection tool
#[derive(Parser, Debug)]
#[command(name = "docrot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a repository for documentation rot
    Scan(ScanArgs),

    /// List the symbols the indexer extracts from a repository
    Symbols(SymbolsArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Sarif,
}

/// Arguments for scan command
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Repository root to scan
    #[arg(default_value = ".")]
    pub path: String,

    /// Check external URLs for liveness
    #[arg(long)]
    pub check_urls: bool,

    /// Extra ignore pattern (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Maximum documents to analyze (0 = unlimited)
    #[arg(long)]
    pub max_docs: Option<usize>,

    /// Per-request timeout for URL checks, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retry cap for transient URL failures
    #[arg(long)]
    pub retries: Option<usize>,

    /// Concurrency limit for URL checks
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Arguments for symbols command
#[derive(Parser, Debug)]
pub struct SymbolsArgs {
    /// Repository root to index
    #[arg(default_value = ".")]
    pub path: String,

    /// Extra ignore pattern (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["docrot", "scan", "--check-urls"]);
        assert!(matches!(cli.command, Commands::Scan(_)));

        if let Commands::Scan(args) = cli.command {
            assert!(args.check_urls);
            assert_eq!(args.path, ".");
        }
    }

    #[test]
    fn test_format_flag() {
        let cli = Cli::parse_from(["docrot", "-f", "sarif", "scan", "repo"]);
        assert_eq!(cli.format, OutputFormat::Sarif);
    }

    #[test]
    fn test_repeatable_ignore() {
        let cli = Cli::parse_from(["docrot", "scan", "-i", "vendor/**", "-i", "*.gen.md"]);
        if let Commands::Scan(args) = cli.command {
            assert_eq!(args.ignore_patterns.len(), 2);
        }
    }
}
