//! Outcome aggregation
//!
//! A single consumer folds outcomes into counters. Every update is a count, a
//! set insert or a histogram bucket increment, so arrival order does not
//! affect the final report and memory does not grow with the request count.

use indicatif::ProgressBar;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::outcome::Outcome;
use crate::report::{LatencyHistogram, Report};

#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    total_requests: u64,
    status_counts: BTreeMap<u16, u64>,
    distinct_errors: BTreeSet<String>,
    latencies: LatencyHistogram,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the running totals
    pub fn record(&mut self, outcome: Outcome) {
        self.total_requests += 1;
        *self.status_counts.entry(outcome.status_code()).or_insert(0) += 1;
        self.latencies.record(outcome.latency());

        if let Outcome::Failure { error, .. } = outcome {
            self.distinct_errors.insert(error);
        }
    }

    /// Consume outcomes until every sender has been dropped
    pub async fn drain(
        mut self,
        mut outcomes: UnboundedReceiver<Outcome>,
        progress: Option<ProgressBar>,
    ) -> Self {
        while let Some(outcome) = outcomes.recv().await {
            self.record(outcome);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish();
        }
        self
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Build the final report. `elapsed` is the wall-clock time of the whole
    /// dispatch, measured by the caller.
    pub fn finish(self, elapsed: Duration) -> Report {
        let latency = self.latencies.stats();

        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0.0 {
            self.total_requests as f64 / secs
        } else {
            0.0
        };

        Report {
            elapsed,
            total_requests: self.total_requests,
            status_counts: self.status_counts,
            distinct_errors: self.distinct_errors,
            latency,
            requests_per_second,
        }
    }
}

impl Extend<Outcome> for Aggregator {
    fn extend<I: IntoIterator<Item = Outcome>>(&mut self, iter: I) {
        for outcome in iter {
            self.record(outcome);
        }
    }
}

impl FromIterator<Outcome> for Aggregator {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut aggregator = Self::new();
        aggregator.extend(iter);
        aggregator
    }
}
