//! Load test orchestration
//!
//! Wires the worker pool to the aggregator over an unbounded channel, times
//! the dispatch and builds the report.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::config::LoadTestConfig;
use crate::dispatcher::Dispatcher;
use crate::report::Report;
use crate::sender::{HttpSender, RequestSender};

/// Run a load test against `config.url`.
///
/// Builds an HTTP sender from `config` (timeout, progress bar) and runs the
/// test to completion. Per-request failures end up in the report; only an
/// invalid configuration, client construction or a crashed collector task
/// return an error.
///
/// # Example
/// ```no_run
/// use url_load_tester::{LoadTestConfig, load_test_url};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = LoadTestConfig::new("http://localhost:8080/health", 100, 10);
///     let report = load_test_url(&config).await?;
///     println!("{}", report);
///     Ok(())
/// }
/// ```
pub async fn load_test_url(config: &LoadTestConfig) -> Result<Report> {
    config.validate()?;

    let sender = Arc::new(HttpSender::new(config.timeout)?);
    let progress = config
        .show_progress
        .then(|| progress_bar(config.total_requests));

    run_load_test(config, sender, progress).await
}

/// Run one load test with the given sender.
///
/// The aggregator drains outcomes while workers are still running. Elapsed
/// time brackets the dispatch only: it starts just before the first worker is
/// launched and stops right after the last one is joined. Fails without
/// sending anything if `config` does not validate.
pub async fn run_load_test(
    config: &LoadTestConfig,
    sender: Arc<dyn RequestSender>,
    progress: Option<ProgressBar>,
) -> Result<Report> {
    config.validate()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(Aggregator::new().drain(rx, progress));

    let dispatcher = Dispatcher::new(config, sender);

    let start_time = Instant::now();
    let completed = dispatcher.run(tx).await;
    let elapsed = start_time.elapsed();

    let aggregator = join_collector(collector).await?;

    info!(
        workers = completed,
        outcomes = aggregator.total_requests(),
        elapsed_secs = elapsed.as_secs_f64(),
        "Load test finished"
    );

    Ok(aggregator.finish(elapsed))
}

/// Wait for the aggregator task. A crashed collector has lost outcomes, so
/// that is an error rather than a partial report.
async fn join_collector(collector: JoinHandle<Aggregator>) -> Result<Aggregator> {
    collector.await.context("Outcome collector task failed")
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({per_sec}) [{eta}]")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
