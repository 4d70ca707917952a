//! Final load test report and its rendering

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use hdrhistogram::Histogram;
use std::time::Duration;

use crate::outcome::TRANSPORT_FAILURE_STATUS;

const MAX_LATENCY_MICROS: u64 = 3_600_000_000;

/// Summary of one load test run, built once after every worker has finished
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Wall-clock time from the first worker launch to the last worker join
    #[serde(rename = "elapsed_seconds", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub total_requests: u64,
    /// Count per status code; `0` counts transport failures
    pub status_counts: BTreeMap<u16, u64>,
    pub distinct_errors: BTreeSet<String>,
    pub latency: Option<LatencyStats>,
    pub requests_per_second: f64,
}

/// Per-request latency statistics in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Latency distribution in microseconds, constant memory regardless of
/// how many requests are recorded
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// 1 microsecond resolution up to one hour, 3 significant digits
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_LATENCY_MICROS, 3)
            .expect("Failed to create histogram");
        Self { histogram }
    }

    /// Record one latency; values above one hour are clamped
    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros);
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Summary statistics, `None` if nothing was recorded
    pub fn stats(&self) -> Option<LatencyStats> {
        if self.histogram.is_empty() {
            return None;
        }

        let h = &self.histogram;
        Some(LatencyStats {
            min_ms: micros_to_ms(h.min()),
            max_ms: micros_to_ms(h.max()),
            avg_ms: h.mean() / 1000.0,
            p50_ms: micros_to_ms(h.value_at_quantile(0.50)),
            p90_ms: micros_to_ms(h.value_at_quantile(0.90)),
            p95_ms: micros_to_ms(h.value_at_quantile(0.95)),
            p99_ms: micros_to_ms(h.value_at_quantile(0.99)),
        })
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

fn serialize_secs<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64())
}

impl Report {
    pub fn status_count(&self, status: u16) -> u64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Responses with status 200
    pub fn success_count(&self) -> u64 {
        self.status_count(200)
    }

    /// Attempts that never got a response
    pub fn failure_count(&self) -> u64 {
        self.status_count(TRANSPORT_FAILURE_STATUS)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Load test report:")?;
        writeln!(f, "Total time: {:.2?}", self.elapsed)?;
        writeln!(f, "Total requests: {}", self.total_requests)?;
        writeln!(f, "Status 200: {}", self.success_count())?;
        for (status, count) in &self.status_counts {
            if *status != 200 {
                writeln!(f, "Status {}: {}", status, count)?;
            }
        }
        writeln!(f, "Requests/sec: {:.2}", self.requests_per_second)?;

        if let Some(latency) = &self.latency {
            writeln!(
                f,
                "Latency (ms): min {:.2} | avg {:.2} | p50 {:.2} | p90 {:.2} | p95 {:.2} | p99 {:.2} | max {:.2}",
                latency.min_ms,
                latency.avg_ms,
                latency.p50_ms,
                latency.p90_ms,
                latency.p95_ms,
                latency.p99_ms,
                latency.max_ms,
            )?;
        }

        if !self.distinct_errors.is_empty() {
            writeln!(f, "Errors:")?;
            for error in &self.distinct_errors {
                writeln!(f, "    - {}", error)?;
            }
        }
        Ok(())
    }
}
