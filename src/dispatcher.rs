//! Work partitioning and the worker pool
//!
//! The total request count is split across a fixed number of workers. Each
//! worker issues its share sequentially and pushes every outcome onto the
//! shared channel; concurrency comes only from running workers side by side.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::LoadTestConfig;
use crate::outcome::Outcome;
use crate::sender::RequestSender;

/// Split `total` requests over `concurrency` workers.
///
/// The first `total % concurrency` workers get one extra request, so loads
/// differ by at most one and always sum to `total`. Workers beyond `total`
/// get zero.
pub fn work_assignment(total: u64, concurrency: u64) -> Vec<u64> {
    if concurrency == 0 {
        return Vec::new();
    }

    let base = total / concurrency;
    let remainder = total % concurrency;

    (0..concurrency)
        .map(|worker| if worker < remainder { base + 1 } else { base })
        .collect()
}

/// Runs the worker pool for one load test
pub struct Dispatcher {
    url: Arc<str>,
    assignment: Vec<u64>,
    sender: Arc<dyn RequestSender>,
}

impl Dispatcher {
    /// `config` is expected to have passed `LoadTestConfig::validate`, which
    /// bounds the number of workers.
    pub fn new(config: &LoadTestConfig, sender: Arc<dyn RequestSender>) -> Self {
        Self {
            url: Arc::from(config.url.as_str()),
            assignment: work_assignment(config.total_requests, config.concurrency),
            sender,
        }
    }

    /// Per-worker request counts, in worker order
    pub fn assignment(&self) -> &[u64] {
        &self.assignment
    }

    /// Launch every worker and wait for all of them.
    ///
    /// `outcomes` is moved in and dropped on return, so the receiving side
    /// sees the channel close only after the last worker has been joined.
    /// Returns the number of workers that ran to completion.
    pub async fn run(&self, outcomes: UnboundedSender<Outcome>) -> usize {
        info!(
            url = %self.url,
            workers = self.assignment.len(),
            total_requests = self.assignment.iter().sum::<u64>(),
            "Launching workers"
        );

        let handles: Vec<JoinHandle<u64>> = self
            .assignment
            .iter()
            .enumerate()
            .map(|(worker_id, &requests)| {
                let url = Arc::clone(&self.url);
                let sender = Arc::clone(&self.sender);
                let outcomes = outcomes.clone();
                tokio::spawn(run_worker(worker_id, url, requests, sender, outcomes))
            })
            .collect();

        drop(outcomes);

        let mut completed = 0;
        for (worker_id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(attempted) => {
                    debug!(worker_id, attempted, "Worker finished");
                    completed += 1;
                }
                Err(e) => {
                    // only with unwinding panics; the release profile aborts instead
                    error!(worker_id, error = %e, "Worker task failed");
                }
            }
        }

        completed
    }
}

/// Issue `requests` sequential GETs. Failures are recorded and the loop
/// keeps going; a zero assignment returns immediately.
async fn run_worker(
    worker_id: usize,
    url: Arc<str>,
    requests: u64,
    sender: Arc<dyn RequestSender>,
    outcomes: UnboundedSender<Outcome>,
) -> u64 {
    let mut attempted = 0;

    for _ in 0..requests {
        let outcome = sender.get(&url).await;
        attempted += 1;

        if outcomes.send(outcome).is_err() {
            // receiver gone, nobody is counting any more
            error!(worker_id, "Outcome channel closed early");
            break;
        }
    }

    attempted
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Returns 200 for every call and counts calls per task
    struct CountingSender {
        calls: AtomicUsize,
        fail_every: Option<usize>,
        per_task: Mutex<HashMap<tokio::task::Id, usize>>,
    }

    impl CountingSender {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every: None,
                per_task: Mutex::new(HashMap::new()),
            }
        }

        fn with_fail_every(mut self, n: usize) -> Self {
            self.fail_every = Some(n);
            self
        }
    }

    #[async_trait]
    impl RequestSender for CountingSender {
        async fn get(&self, _url: &str) -> Outcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(id) = tokio::task::try_id() {
                *self.per_task.lock().unwrap().entry(id).or_insert(0) += 1;
            }
            tokio::task::yield_now().await;

            match self.fail_every {
                Some(every) if n % every == 0 => {
                    Outcome::failure("connection reset", Duration::from_millis(1))
                }
                _ => Outcome::response(200, Duration::from_millis(1)),
            }
        }
    }

    async fn dispatch(
        config: &LoadTestConfig,
        sender: Arc<CountingSender>,
    ) -> (usize, Vec<Outcome>) {
        let dispatcher = Dispatcher::new(config, sender);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let completed = dispatcher.run(tx).await;

        let mut received = Vec::new();
        while let Some(outcome) = rx.recv().await {
            received.push(outcome);
        }
        (completed, received)
    }

    #[test]
    fn test_work_assignment_even_split() {
        assert_eq!(work_assignment(10, 5), vec![2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_work_assignment_remainder_goes_first() {
        assert_eq!(work_assignment(5, 2), vec![3, 2]);
        assert_eq!(work_assignment(11, 4), vec![3, 3, 3, 2]);
    }

    #[test]
    fn test_work_assignment_more_workers_than_requests() {
        let assignment = work_assignment(3, 10);
        assert_eq!(assignment.len(), 10);
        assert_eq!(assignment.iter().filter(|&&n| n == 1).count(), 3);
        assert_eq!(assignment.iter().filter(|&&n| n == 0).count(), 7);
    }

    #[test]
    fn test_work_assignment_sums_and_balances() {
        for total in 1..=60u64 {
            for concurrency in 1..=25u64 {
                let assignment = work_assignment(total, concurrency);
                assert_eq!(assignment.len() as u64, concurrency);
                assert_eq!(assignment.iter().sum::<u64>(), total);

                let max = *assignment.iter().max().unwrap();
                let min = *assignment.iter().min().unwrap();
                assert!(max - min <= 1, "total={} concurrency={}", total, concurrency);
            }
        }
    }

    #[test]
    fn test_dispatcher_uses_config_assignment() {
        let config = LoadTestConfig::new("http://localhost/", 7, 3);
        let dispatcher = Dispatcher::new(&config, Arc::new(CountingSender::new()));
        assert_eq!(dispatcher.assignment(), &[3, 2, 2]);
    }

    #[tokio::test]
    async fn test_run_produces_one_outcome_per_request() {
        let sender = Arc::new(CountingSender::new());
        let config = LoadTestConfig::new("http://localhost/", 25, 4);

        let (completed, outcomes) = dispatch(&config, Arc::clone(&sender)).await;

        assert_eq!(completed, 4);
        assert_eq!(outcomes.len(), 25);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_worker_issues_its_share() {
        let sender = Arc::new(CountingSender::new());
        let config = LoadTestConfig::new("http://localhost/", 5, 2);

        let (_, outcomes) = dispatch(&config, Arc::clone(&sender)).await;
        assert_eq!(outcomes.len(), 5);

        let mut shares: Vec<usize> = sender.per_task.lock().unwrap().values().copied().collect();
        shares.sort_unstable();
        assert_eq!(shares, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_idle_workers_still_complete() {
        let sender = Arc::new(CountingSender::new());
        let config = LoadTestConfig::new("http://localhost/", 3, 10);

        let (completed, outcomes) = dispatch(&config, Arc::clone(&sender)).await;

        assert_eq!(completed, 10);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(sender.per_task.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_workers() {
        let sender = Arc::new(CountingSender::new().with_fail_every(2));
        let config = LoadTestConfig::new("http://localhost/", 10, 1);

        let (_, outcomes) = dispatch(&config, Arc::clone(&sender)).await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes.iter().filter(|o| o.is_failure()).count(), 5);
    }
}
