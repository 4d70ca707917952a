//! HTTP request sending
//!
//! `RequestSender` is the seam between the worker pool and the network.
//! `HttpSender` is the real implementation backed by a shared reqwest client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::outcome::Outcome;

/// Issues one GET and reports what happened. Never fails: transport errors
/// are returned as `Outcome::Failure`.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn get(&self, url: &str) -> Outcome;
}

/// reqwest-backed sender. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: Client,
}

impl HttpSender {
    /// Create a sender, optionally bounding every request by `timeout`
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestSender for HttpSender {
    async fn get(&self, url: &str) -> Outcome {
        let started = Instant::now();

        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                drain_body(response, url).await;
                Outcome::response(status, started.elapsed())
            }
            Err(err) => {
                debug!(url, error = %err, "GET failed");
                Outcome::from_error(&err, started.elapsed())
            }
        }
    }
}

/// Read the body to the end and drop it so the connection goes back to the pool.
/// The content is discarded; a read error here does not change the outcome.
async fn drain_body(mut response: Response, url: &str) {
    loop {
        match response.chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(err) => {
                debug!(url, error = %err, "Failed to drain response body");
                break;
            }
        }
    }
}
