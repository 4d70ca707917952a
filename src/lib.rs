//! URL load tester
//!
//! Sends a fixed number of GET requests to one URL from a pool of concurrent
//! workers and folds the outcomes into a report:
//! - `dispatcher`: splits the work and runs the workers
//! - `aggregator`: counts statuses, collects distinct errors and latencies
//! - `report`: the final summary, as text or JSON

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod load_test_url;
pub mod outcome;
pub mod report;
pub mod sender;

pub use aggregator::Aggregator;
pub use config::{CliArgs, LoadTestConfig, MAX_CONCURRENCY, normalize_args};
pub use dispatcher::{Dispatcher, work_assignment};
pub use load_test_url::{load_test_url, run_load_test};
pub use outcome::Outcome;
pub use report::{LatencyHistogram, LatencyStats, Report};
pub use sender::{HttpSender, RequestSender};
