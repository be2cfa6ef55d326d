//! External URL liveness checking
//!
//! The only component that performs blocking I/O. Runs on its own bounded
//! tokio pool with a per-host concurrency cap. Unique URLs are checked once
//! per scan and the cached verdict is fanned back to every referencing
//! location. Only transport failures are retried; definitive HTTP statuses
//! never are.

use crate::report::{Finding, FindingCategory, Severity};
use crate::resolve::UrlRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Link checker tuning, supplied by the caller
#[derive(Debug, Clone)]
pub struct LinkCheckConfig {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retry cap for transient transport failures
    pub max_retries: usize,
    /// Overall in-flight request bound
    pub concurrency: usize,
    /// In-flight bound per remote host
    pub per_host: usize,
    /// Whole-phase deadline; outstanding checks report "timed out"
    pub scan_timeout: Duration,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_retries: 2,
            concurrency: 16,
            per_host: 4,
            scan_timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of a single probe attempt
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// HTTP status received
    Status(u16),
    /// Transient transport failure (timeout, connection reset); retryable
    Transient(String),
    /// Definitive transport failure; never retried
    Failed(String),
}

/// Transport seam, so tests run without a network
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

/// reqwest-backed probe issuing lightweight HEAD requests
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        match self.client.head(url).timeout(timeout).send().await {
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(err) if err.is_timeout() || err.is_connect() => {
                ProbeOutcome::Transient(err.to_string())
            }
            Err(err) => ProbeOutcome::Failed(err.to_string()),
        }
    }
}

/// Cached per-URL verdict
#[derive(Debug, Clone, PartialEq, Eq)]
enum UrlVerdict {
    Live,
    Dead(String),
}

/// Checks absolute URLs under concurrency and rate limits
pub struct LinkChecker {
    config: LinkCheckConfig,
    probe: Arc<dyn UrlProbe>,
}

impl LinkChecker {
    /// Checker with the real HTTP transport
    pub fn new(config: LinkCheckConfig) -> Self {
        Self {
            config,
            probe: Arc::new(HttpProbe::new()),
        }
    }

    /// Checker with a caller-supplied transport
    pub fn with_probe(config: LinkCheckConfig, probe: Arc<dyn UrlProbe>) -> Self {
        Self { config, probe }
    }

    /// Check all referenced URLs and produce `dead-url` findings.
    /// Blocking entry point; the async pool lives inside.
    pub fn check(&self, refs: &[UrlRef]) -> Result<Vec<Finding>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let unique: BTreeSet<String> = refs.iter().map(|r| r.url.clone()).collect();
        tracing::debug!(urls = unique.len(), refs = refs.len(), "checking external links");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start link checker runtime")?;
        let verdicts = runtime.block_on(self.check_unique(unique.into_iter().collect()));

        let mut findings = Vec::new();
        for url_ref in refs {
            let Some(UrlVerdict::Dead(reason)) = verdicts.get(&url_ref.url) else {
                continue;
            };
            let severity = if reason == "timed out" {
                Severity::Low
            } else {
                Severity::Medium
            };
            findings.push(Finding::new(
                FindingCategory::DeadUrl,
                severity,
                &url_ref.file,
                url_ref.line,
                format!("Dead URL: {} ({})", url_ref.url, reason),
                &url_ref.url,
            ));
        }
        Ok(findings)
    }

    async fn check_unique(&self, urls: Vec<String>) -> BTreeMap<String, UrlVerdict> {
        let deadline = tokio::time::Instant::now() + self.config.scan_timeout;
        let global = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut hosts: HashMap<String, Arc<Semaphore>> = HashMap::new();
        for url in &urls {
            hosts
                .entry(host_of(url))
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_host.max(1))));
        }

        let mut handles = Vec::new();
        for url in urls {
            let probe = Arc::clone(&self.probe);
            let config = self.config.clone();
            let global = Arc::clone(&global);
            let host = Arc::clone(&hosts[&host_of(&url)]);

            handles.push((
                url.clone(),
                tokio::spawn(async move {
                    let checked = tokio::time::timeout_at(deadline, async {
                        let _global = global.acquire_owned().await;
                        let _host = host.acquire_owned().await;
                        probe_with_retry(probe.as_ref(), &config, &url).await
                    })
                    .await;

                    match checked {
                        Ok(verdict) => verdict,
                        Err(_) => UrlVerdict::Dead("timed out".to_string()),
                    }
                }),
            ));
        }

        let mut verdicts = BTreeMap::new();
        for (url, handle) in handles {
            let verdict = match handle.await {
                Ok(verdict) => verdict,
                Err(_) => UrlVerdict::Dead("check aborted".to_string()),
            };
            verdicts.insert(url, verdict);
        }
        verdicts
    }
}

/// Probe one URL, retrying transient failures with exponential backoff
async fn probe_with_retry(probe: &dyn UrlProbe, config: &LinkCheckConfig, url: &str) -> UrlVerdict {
    let mut attempt = 0;
    loop {
        match probe.probe(url, config.request_timeout).await {
            ProbeOutcome::Status(status) if (200..400).contains(&status) => {
                return UrlVerdict::Live;
            }
            ProbeOutcome::Status(status) => {
                return UrlVerdict::Dead(status.to_string());
            }
            ProbeOutcome::Failed(message) => {
                return UrlVerdict::Dead(message);
            }
            ProbeOutcome::Transient(message) => {
                if attempt >= config.max_retries {
                    return UrlVerdict::Dead(format!(
                        "unreachable after {} attempts",
                        attempt + 1
                    ));
                }
                tracing::debug!(url, attempt, %message, "transient failure, retrying");
                tokio::time::sleep(Duration::from_millis(250 * (1 << attempt))).await;
                attempt += 1;
            }
        }
    }
}

/// Host portion of an http(s) URL, for per-host limiting
fn host_of(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split(['/', '?', '#']).next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted probe counting attempts per URL
    struct MockProbe {
        outcomes: HashMap<String, Vec<ProbeOutcome>>,
        attempts: Mutex<HashMap<String, usize>>,
    }

    impl MockProbe {
        fn new(outcomes: Vec<(&str, Vec<ProbeOutcome>)>) -> Self {
            Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(url, seq)| (url.to_string(), seq))
                    .collect(),
                attempts: Mutex::new(HashMap::new()),
            }
        }

        fn attempts_for(&self, url: &str) -> usize {
            *self.attempts.lock().unwrap().get(url).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl UrlProbe for MockProbe {
        async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(url.to_string()).or_insert(0);
            let outcome = self
                .outcomes
                .get(url)
                .and_then(|seq| seq.get(*n).or_else(|| seq.last()))
                .cloned()
                .unwrap_or(ProbeOutcome::Status(200));
            *n += 1;
            outcome
        }
    }

    fn config() -> LinkCheckConfig {
        LinkCheckConfig {
            request_timeout: Duration::from_millis(100),
            max_retries: 2,
            concurrency: 4,
            per_host: 2,
            scan_timeout: Duration::from_secs(10),
        }
    }

    fn url_ref(url: &str, file: &str, line: usize) -> UrlRef {
        UrlRef {
            url: url.to_string(),
            file: file.to_string(),
            line,
        }
    }

    #[test]
    fn test_live_url_produces_no_finding() {
        let probe = Arc::new(MockProbe::new(vec![(
            "https://example.com/ok",
            vec![ProbeOutcome::Status(200)],
        )]));
        let checker = LinkChecker::with_probe(config(), probe);

        let findings = checker
            .check(&[url_ref("https://example.com/ok", "README.md", 3)])
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_definitive_404_is_not_retried() {
        let probe = Arc::new(MockProbe::new(vec![(
            "https://example.com/old-page",
            vec![ProbeOutcome::Status(404)],
        )]));
        let checker = LinkChecker::with_probe(config(), Arc::clone(&probe) as Arc<dyn UrlProbe>);

        let findings = checker
            .check(&[url_ref("https://example.com/old-page", "README.md", 7)])
            .unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, FindingCategory::DeadUrl);
        assert!(findings[0].message.contains("404"));
        assert_eq!(probe.attempts_for("https://example.com/old-page"), 1);
    }

    #[test]
    fn test_transient_failures_are_retried_then_reported() {
        let probe = Arc::new(MockProbe::new(vec![(
            "https://flaky.example.com/x",
            vec![ProbeOutcome::Transient("connection reset".to_string())],
        )]));
        let checker = LinkChecker::with_probe(config(), Arc::clone(&probe) as Arc<dyn UrlProbe>);

        let findings = checker
            .check(&[url_ref("https://flaky.example.com/x", "docs/a.md", 1)])
            .unwrap();

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("unreachable after 3 attempts"));
        assert_eq!(probe.attempts_for("https://flaky.example.com/x"), 3);
    }

    #[test]
    fn test_transient_then_success_is_live() {
        let probe = Arc::new(MockProbe::new(vec![(
            "https://example.com/slow",
            vec![
                ProbeOutcome::Transient("timeout".to_string()),
                ProbeOutcome::Status(200),
            ],
        )]));
        let checker = LinkChecker::with_probe(config(), probe);

        let findings = checker
            .check(&[url_ref("https://example.com/slow", "docs/a.md", 2)])
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_duplicate_url_checked_once_reported_per_location() {
        let probe = Arc::new(MockProbe::new(vec![(
            "https://example.com/gone",
            vec![ProbeOutcome::Status(410)],
        )]));
        let checker = LinkChecker::with_probe(config(), Arc::clone(&probe) as Arc<dyn UrlProbe>);

        let findings = checker
            .check(&[
                url_ref("https://example.com/gone", "docs/a.md", 4),
                url_ref("https://example.com/gone", "docs/b.md", 9),
            ])
            .unwrap();

        // One check, two findings: the locations differ.
        assert_eq!(probe.attempts_for("https://example.com/gone"), 1);
        assert_eq!(findings.len(), 2);
        assert_ne!(findings[0].fingerprint, findings[1].fingerprint);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://example.com/a/b"), "example.com");
        assert_eq!(host_of("http://example.com?q=1"), "example.com");
    }
}
