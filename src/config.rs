//! Command-line configuration
//!
//! Flags may be written Go style (`-url http://...`, `-requests=100`) or with
//! the usual double dash; `normalize_args` rewrites the former before clap
//! parses them.

use anyhow::{Result, bail};
use clap::Parser;
use std::ffi::OsString;
use std::time::Duration;

/// Long flags that are also accepted with a single leading dash
const LONG_FLAGS: &[&str] = &["url", "requests", "concurrency", "timeout", "json", "progress"];

/// Upper bound on workers; each one is a tokio task plus a slot in the work split
pub const MAX_CONCURRENCY: u64 = 100_000;

/// CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "url-load-tester")]
#[command(about = "Send a fixed number of GET requests to a URL and report the results", long_about = None)]
pub struct CliArgs {
    /// Target URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Total number of requests to send
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub requests: u64,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..=MAX_CONCURRENCY))]
    pub concurrency: u64,

    /// Per-request timeout in seconds (no timeout when omitted)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Show a progress bar on stderr while running
    #[arg(long)]
    pub progress: bool,
}

impl CliArgs {
    /// Parse the process arguments, accepting Go-style flags
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Turn parsed flags into a run configuration.
    ///
    /// Returns `Ok(None)` when no URL was given; the caller reports that and
    /// exits without running anything.
    pub fn into_config(self) -> Result<Option<LoadTestConfig>> {
        let url = match self.url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => return Ok(None),
        };

        let mut config = LoadTestConfig::new(url, self.requests, self.concurrency)
            .with_progress(self.progress);
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(Some(config))
    }
}

/// Rewrite `-flag` / `-flag=value` to `--flag` / `--flag=value` for known long flags
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-') else {
                return arg;
            };
            if rest.starts_with('-') {
                return arg;
            }

            let name = rest.split('=').next().unwrap_or(rest);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("-{}", text))
            } else {
                arg
            }
        })
        .collect()
}

/// Settings for one load test run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTestConfig {
    pub url: String,
    pub total_requests: u64,
    pub concurrency: u64,
    pub timeout: Option<Duration>,
    pub show_progress: bool,
}

impl LoadTestConfig {
    pub fn new(url: impl Into<String>, total_requests: u64, concurrency: u64) -> Self {
        Self {
            url: url.into(),
            total_requests,
            concurrency,
            timeout: None,
            show_progress: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("URL must not be empty");
        }
        if self.total_requests == 0 {
            bail!("Total requests must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if self.concurrency > MAX_CONCURRENCY {
            bail!(
                "Concurrency {} exceeds the maximum of {}",
                self.concurrency,
                MAX_CONCURRENCY
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(normalize_args(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_normalize_go_style_flags() {
        let args = normalize_args(["bin", "-url", "http://a", "-requests=5", "--concurrency", "2", "-h"]);
        assert_eq!(
            args,
            vec!["bin", "--url", "http://a", "--requests=5", "--concurrency", "2", "-h"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_normalize_leaves_unknown_flags_alone() {
        let args = normalize_args(["bin", "-x", "-"]);
        assert_eq!(args, vec![OsString::from("bin"), OsString::from("-x"), OsString::from("-")]);
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["bin", "-url", "http://localhost:8080"]);
        assert_eq!(args.requests, 1);
        assert_eq!(args.concurrency, 1);
        assert_eq!(args.timeout, None);
        assert!(!args.json);
        assert!(!args.progress);

        let config = args.into_config().unwrap().unwrap();
        assert_eq!(config, LoadTestConfig::new("http://localhost:8080", 1, 1));
    }

    #[test]
    fn test_full_flags() {
        let args = parse(&[
            "bin",
            "-url=http://localhost/x",
            "-requests",
            "100",
            "-concurrency=10",
            "-timeout",
            "3",
            "-json",
            "--progress",
        ]);
        assert!(args.json);

        let config = args.into_config().unwrap().unwrap();
        assert_eq!(config.url, "http://localhost/x");
        assert_eq!(config.total_requests, 100);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert!(config.show_progress);
    }

    #[test]
    fn test_missing_url_yields_no_config() {
        assert!(parse(&["bin"]).into_config().unwrap().is_none());
        assert!(parse(&["bin", "-url", "  "]).into_config().unwrap().is_none());
    }

    #[test]
    fn test_zero_counts_rejected() {
        let result = CliArgs::try_parse_from(normalize_args(["bin", "-url", "http://a", "-requests", "0"]));
        assert!(result.is_err());

        let result = CliArgs::try_parse_from(normalize_args(["bin", "-url", "http://a", "-concurrency", "0"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_concurrency_rejected() {
        let max = MAX_CONCURRENCY.to_string();
        let args = parse(&["bin", "-url", "http://a", "-concurrency", max.as_str()]);
        assert_eq!(args.concurrency, MAX_CONCURRENCY);

        let over = (MAX_CONCURRENCY + 1).to_string();
        let result = CliArgs::try_parse_from(normalize_args(["bin", "-url", "http://a", "-concurrency", over.as_str()]));
        assert!(result.is_err());

        let huge = u64::MAX.to_string();
        let result = CliArgs::try_parse_from(normalize_args(["bin", "-url", "http://a", "-concurrency", huge.as_str()]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(LoadTestConfig::new("http://a", 1, 1).validate().is_ok());
        assert!(LoadTestConfig::new("", 1, 1).validate().is_err());
        assert!(LoadTestConfig::new("http://a", 0, 1).validate().is_err());
        assert!(LoadTestConfig::new("http://a", 1, 0).validate().is_err());
        assert!(LoadTestConfig::new("http://a", 1, MAX_CONCURRENCY).validate().is_ok());
        assert!(LoadTestConfig::new("http://a", 1, MAX_CONCURRENCY + 1).validate().is_err());
        assert!(LoadTestConfig::new("http://a", 1, u64::MAX).validate().is_err());
    }
}
