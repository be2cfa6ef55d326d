//! DocRot - Documentation rot detection tool
//!
//! Detects rotting documentation: broken links, stale symbol references,
//! drifted code examples, and dead external URLs.

use anyhow::Result;
use clap::Parser;
use docrot::cli::{scan, symbols, Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Scan(args) => {
            let code = match scan(&args, cli.format) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("error: {:#}", err);
                    2
                }
            };
            std::process::exit(code);
        }

        Commands::Symbols(args) => {
            symbols(&args)?;
        }
    }

    Ok(())
}
