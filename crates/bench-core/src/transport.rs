use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::dispatcher::{BatchJob, BatchOutcome};
use crate::error::SendErrorKind;
use crate::payload::Record;

/// Capability that sends one batch and resolves to its outcome. Injected
/// into the dispatcher so runs can be driven without network I/O.
pub trait BatchSender: Send + Sync {
    fn name(&self) -> &'static str;

    fn send_batch<'a>(
        &'a self,
        job: &'a BatchJob,
        batch: &'a [Record],
    ) -> Pin<Box<dyn std::future::Future<Output = BatchOutcome> + Send + 'a>>;
}

/// Mock sender for tests and dry runs: echoes the serialized batch size
/// after a configurable delay, optionally failing selected batch indices
/// with a 500 status.
pub struct MockBatchSender {
    delay_ms: u64,
    fail_indices: HashSet<u32>,
    calls: AtomicUsize,
}

impl MockBatchSender {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            fail_indices: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(delay_ms: u64, fail_indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            delay_ms,
            fail_indices: fail_indices.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of send_batch invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl BatchSender for MockBatchSender {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send_batch<'a>(
        &'a self,
        job: &'a BatchJob,
        batch: &'a [Record],
    ) -> Pin<Box<dyn std::future::Future<Output = BatchOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_indices.contains(&job.index) {
                return job.failure(SendErrorKind::Status(500));
            }
            match serde_json::to_vec(batch) {
                Ok(body) => job.success(body.len() as u64),
                Err(e) => job.failure(SendErrorKind::Serialization(e.to_string())),
            }
        })
    }
}

/// HTTP sender: POSTs each batch as a JSON array to the configured URI.
pub struct HttpBatchSender {
    client: reqwest::Client,
    uri: String,
}

impl HttpBatchSender {
    pub fn new(uri: String, timeout_ms: Option<u64>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build()?;
        Ok(Self { client, uri })
    }
}

impl BatchSender for HttpBatchSender {
    fn name(&self) -> &'static str {
        "http"
    }

    fn send_batch<'a>(
        &'a self,
        job: &'a BatchJob,
        batch: &'a [Record],
    ) -> Pin<Box<dyn std::future::Future<Output = BatchOutcome> + Send + 'a>> {
        Box::pin(async move {
            // Size accounting uses the serialized body, not bytes on the
            // wire (no headers or framing), so reports stay comparable
            // across transports.
            let body = match serde_json::to_vec(batch) {
                Ok(body) => body,
                Err(e) => return job.failure(SendErrorKind::Serialization(e.to_string())),
            };
            let bytes_sent = body.len() as u64;

            let response = self
                .client
                .post(&self.uri)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    // Drain the body so the connection can be reused.
                    let _ = resp.bytes().await;
                    debug!("batch {} -> {}", job.index, status);
                    if status.is_success() {
                        job.success(bytes_sent)
                    } else {
                        job.failure(SendErrorKind::Status(status.as_u16()))
                    }
                }
                Err(e) if e.is_timeout() => job.failure(SendErrorKind::Timeout),
                Err(e) => job.failure(SendErrorKind::Transport(e.to_string())),
            }
        })
    }
}
