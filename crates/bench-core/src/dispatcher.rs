use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

use crate::config::Config;
use crate::error::{BenchError, SendErrorKind};
use crate::payload::PayloadGenerator;
use crate::report::{Aggregator, RunReport};
use crate::transport::BatchSender;

/// One unit of work: which batch this is and how many records it carries.
/// Created by the dispatcher at scheduling time, discarded once its
/// outcome is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchJob {
    pub index: u32,
    pub batch_size: u32,
}

impl BatchJob {
    pub fn success(&self, bytes_sent: u64) -> BatchOutcome {
        BatchOutcome {
            index: self.index,
            result: Ok(bytes_sent),
        }
    }

    pub fn failure(&self, kind: SendErrorKind) -> BatchOutcome {
        let retryable = kind.retryable();
        BatchOutcome {
            index: self.index,
            result: Err(SendFailure { kind, retryable }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub kind: SendErrorKind,
    pub retryable: bool,
}

/// Resolved result of one batch: bytes sent on success, typed failure
/// otherwise. Produced exactly once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: u32,
    pub result: Result<u64, SendFailure>,
}

/// Runs all configured batches with at most `max_concurrent` in flight
/// and reduces their outcomes into a single report.
pub struct Dispatcher {
    config: Config,
    sender: Arc<dyn BatchSender>,
}

impl Dispatcher {
    pub fn new(config: Config, sender: Arc<dyn BatchSender>) -> Self {
        Self { config, sender }
    }

    /// Schedules every batch, each gated by the concurrency limiter, and
    /// returns the finalized report once all of them have resolved. A
    /// single batch failing never cancels or blocks the others; only a
    /// setup problem aborts, and it does so before any batch is scheduled.
    pub async fn run(&self, generator: &mut PayloadGenerator) -> Result<RunReport, BenchError> {
        self.config.validate()?;

        let total = self.config.run.total_batches;
        let batch_size = self.config.run.batch_size;
        let start = Instant::now();

        if total == 0 {
            return Aggregator::new(0, batch_size).finalize(start.elapsed());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.run.max_concurrent as usize));
        let deadline = self.config.target.timeout_ms.map(Duration::from_millis);
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<BatchOutcome>(total as usize);

        // Single consumer: this task is the only writer to the
        // aggregator, so concurrent completions cannot lose updates.
        let collector = {
            let mut aggregator = Aggregator::new(total, batch_size);
            tokio::spawn(async move {
                while let Some(outcome) = outcome_rx.recv().await {
                    aggregator.record(outcome)?;
                }
                Ok::<_, BenchError>(aggregator)
            })
        };

        let mut handles = Vec::with_capacity(total as usize);
        for index in 0..total {
            let job = BatchJob { index, batch_size };
            let batch = generator.build_batch(batch_size);
            let semaphore = semaphore.clone();
            let sender = self.sender.clone();
            let outcome_tx = outcome_tx.clone();

            handles.push(tokio::spawn(async move {
                // Acquiring suspends this job only, never the scheduling
                // of the others. The owned permit is dropped on every
                // exit path, releasing the slot on success and failure
                // alike.
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let send = sender.send_batch(&job, &batch);
                        match deadline {
                            Some(limit) => match tokio::time::timeout(limit, send).await {
                                Ok(outcome) => outcome,
                                Err(_) => job.failure(SendErrorKind::Timeout),
                            },
                            None => send.await,
                        }
                    }
                    // The semaphore is owned by this run and never closed.
                    Err(_) => job.failure(SendErrorKind::Transport(
                        "concurrency limiter closed".into(),
                    )),
                };

                if let Err(failure) = &outcome.result {
                    warn!("batch {} failed: {}", outcome.index, failure.kind);
                }
                let _ = outcome_tx.send(outcome).await;
            }));
        }
        drop(outcome_tx);

        for handle in handles {
            handle.await?;
        }

        let aggregator = collector.await??;
        aggregator.finalize(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunConfig, ScenarioConfig, TargetConfig};
    use crate::payload::Record;
    use crate::transport::MockBatchSender;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn test_config(batch_size: u32, total_batches: u32, max_concurrent: u32) -> Config {
        Config {
            scenario: ScenarioConfig { seed: 42 },
            run: RunConfig {
                batch_size,
                total_batches,
                max_concurrent,
            },
            target: TargetConfig {
                uri: "http://localhost:8080/api".into(),
                timeout_ms: None,
            },
        }
    }

    /// Sender that tracks how many sends are active at once and the
    /// observed peak.
    struct ConcurrencyProbe {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl BatchSender for ConcurrencyProbe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn send_batch<'a>(
            &'a self,
            job: &'a BatchJob,
            _batch: &'a [Record],
        ) -> Pin<Box<dyn std::future::Future<Output = BatchOutcome> + Send + 'a>> {
            Box::pin(async move {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                job.success(1)
            })
        }
    }

    #[tokio::test]
    async fn test_zero_batches_yields_empty_report_without_sending() {
        let sender = Arc::new(MockBatchSender::new(0));
        let dispatcher = Dispatcher::new(test_config(20, 0, 4), sender.clone());
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 0);
        assert_eq!(report.total_bytes, 0);
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_setup_fails_before_scheduling() {
        let sender = Arc::new(MockBatchSender::new(0));
        let dispatcher = Dispatcher::new(test_config(0, 10, 4), sender.clone());
        let mut generator = PayloadGenerator::new(42);

        let err = dispatcher.run(&mut generator).await.unwrap_err();
        assert!(matches!(err, BenchError::Setup(_)));
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_ceiling() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let dispatcher = Dispatcher::new(test_config(5, 30, 4), probe.clone());
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.successes, 30);
        assert!(
            probe.peak() <= 4,
            "observed peak {} exceeds ceiling 4",
            probe.peak()
        );
        // With 30 jobs waiting, the limiter should actually fill up.
        assert!(probe.peak() >= 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_recorded_not_fatal() {
        let sender = Arc::new(MockBatchSender::failing(0, [3, 7]));
        let dispatcher = Dispatcher::new(test_config(5, 10, 4), sender);
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.successes, 8);
        assert_eq!(report.failures, 2);

        // The seed fixes every batch, so the succeeding sizes can be
        // recomputed independently.
        let mut shadow = PayloadGenerator::new(42);
        let expected: u64 = (0..10)
            .map(|i| {
                let batch = shadow.build_batch(5);
                if i == 3 || i == 7 {
                    0
                } else {
                    serde_json::to_vec(&batch).unwrap().len() as u64
                }
            })
            .sum();
        assert_eq!(report.total_bytes, expected);
    }

    #[tokio::test]
    async fn test_all_failures_still_produce_report() {
        let sender = Arc::new(MockBatchSender::failing(0, 0..5));
        let dispatcher = Dispatcher::new(test_config(5, 5, 2), sender);
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 5);
        assert_eq!(report.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_per_job_deadline_resolves_to_timeout_failure() {
        let mut config = test_config(5, 3, 3);
        config.target.timeout_ms = Some(5);
        // 50ms sender against a 5ms deadline: every job must still resolve.
        let sender = Arc::new(MockBatchSender::new(50));
        let dispatcher = Dispatcher::new(config, sender);
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 3);
    }

    #[tokio::test]
    async fn test_end_to_end_report_fields() {
        let sender = Arc::new(MockBatchSender::new(0));
        let dispatcher = Dispatcher::new(test_config(20, 10, 20), sender);
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.total_batches, 10);
        assert_eq!(report.batch_size, 20);
        assert_eq!(report.total_items(), 200);
        assert_eq!(report.successes, 10);
        assert!(report.total_bytes > 0);
    }

    #[tokio::test]
    async fn test_limiter_larger_than_job_count() {
        let sender = Arc::new(MockBatchSender::new(0));
        let dispatcher = Dispatcher::new(test_config(2, 3, 100), sender);
        let mut generator = PayloadGenerator::new(42);

        let report = dispatcher.run(&mut generator).await.unwrap();
        assert_eq!(report.successes, 3);
    }
}
