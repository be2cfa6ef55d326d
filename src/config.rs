//! Repository configuration for DocRot
//!
//! An optional `.docrot.toml` at the repository root. Every field has a
//! default, and CLI flags win over file values.

use crate::linkcheck::LinkCheckConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the config file at the repository root
pub const CONFIG_FILE: &str = ".docrot.toml";

/// Configuration for a repository being scanned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocrotConfig {
    /// Extra ignore patterns (glob, merged with built-ins)
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Check external URLs for liveness
    #[serde(default)]
    pub check_urls: bool,

    /// Maximum documents analyzed per scan (0 = unlimited)
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,

    /// Link checker tuning
    #[serde(default)]
    pub links: LinksConfig,
}

/// Link checker section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry cap for transient failures
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Overall in-flight request bound
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// In-flight bound per remote host
    #[serde(default = "default_per_host")]
    pub per_host: usize,

    /// Whole-phase deadline in seconds
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

fn default_max_docs() -> usize {
    0
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_concurrency() -> usize {
    16
}

fn default_per_host() -> usize {
    4
}

fn default_scan_timeout_secs() -> u64 {
    60
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            concurrency: default_concurrency(),
            per_host: default_per_host(),
            scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

impl Default for DocrotConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            check_urls: false,
            max_docs: default_max_docs(),
            links: LinksConfig::default(),
        }
    }
}

impl DocrotConfig {
    /// Load configuration from the repository root or return defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: DocrotConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the repository root
    pub fn save(&self, repo_root: &Path) -> Result<()> {
        let config_path = repo_root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Link checker settings in engine form
    pub fn link_check_config(&self) -> LinkCheckConfig {
        LinkCheckConfig {
            request_timeout: Duration::from_secs(self.links.timeout_secs),
            max_retries: self.links.retries,
            concurrency: self.links.concurrency,
            per_host: self.links.per_host,
            scan_timeout: Duration::from_secs(self.links.scan_timeout_secs),
        }
    }
}
