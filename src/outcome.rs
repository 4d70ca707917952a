//! Per-request outcome
//!
//! One `Outcome` is produced for every attempted GET. It is created by the
//! worker that issued the request and moved to the aggregator over the
//! outcome channel.

use std::error::Error;
use std::time::Duration;

/// Status code recorded for attempts that never received a response
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Result of a single GET attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An HTTP response was received (any status, including 4xx/5xx)
    Response { status: u16, latency: Duration },
    /// The request failed before a status was obtained
    Failure { error: String, latency: Duration },
}

impl Outcome {
    pub fn response(status: u16, latency: Duration) -> Self {
        Self::Response { status, latency }
    }

    pub fn failure(error: impl Into<String>, latency: Duration) -> Self {
        Self::Failure {
            error: error.into(),
            latency,
        }
    }

    /// Build a failure outcome from a transport error, keeping its cause chain
    pub fn from_error(err: &(dyn Error + 'static), latency: Duration) -> Self {
        Self::failure(error_chain(err), latency)
    }

    /// Numeric status code, `0` for transport failures
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Response { status, .. } => *status,
            Self::Failure { .. } => TRANSPORT_FAILURE_STATUS,
        }
    }

    /// Error text for transport failures
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Response { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn latency(&self) -> Duration {
        match self {
            Self::Response { latency, .. } | Self::Failure { latency, .. } => *latency,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Render an error followed by its `source()` chain, joined with `": "`
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // some wrappers repeat the inner message verbatim
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
