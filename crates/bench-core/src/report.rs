use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::dispatcher::BatchOutcome;
use crate::error::BenchError;

/// Folds batch outcomes into a run report. Accepts exactly one outcome
/// per batch index and refuses to finalize until all of them are in.
pub struct Aggregator {
    total_batches: u32,
    batch_size: u32,
    seen: Vec<bool>,
    total_bytes: u64,
    successes: u32,
    failures: u32,
}

impl Aggregator {
    pub fn new(total_batches: u32, batch_size: u32) -> Self {
        Self {
            total_batches,
            batch_size,
            seen: vec![false; total_batches as usize],
            total_bytes: 0,
            successes: 0,
            failures: 0,
        }
    }

    pub fn record(&mut self, outcome: BatchOutcome) -> Result<(), BenchError> {
        let idx = outcome.index as usize;
        if idx >= self.seen.len() {
            return Err(BenchError::UnknownBatch {
                index: outcome.index,
            });
        }
        if self.seen[idx] {
            return Err(BenchError::DuplicateOutcome {
                index: outcome.index,
            });
        }
        self.seen[idx] = true;

        match outcome.result {
            Ok(bytes) => {
                self.total_bytes += bytes;
                self.successes += 1;
            }
            Err(_) => self.failures += 1,
        }
        Ok(())
    }

    pub fn recorded(&self) -> u32 {
        self.successes + self.failures
    }

    /// Consumes the aggregator once every batch has resolved. Calling
    /// this with outcomes still missing is a caller bug.
    pub fn finalize(self, elapsed: Duration) -> Result<RunReport, BenchError> {
        let recorded = self.recorded();
        if recorded != self.total_batches {
            return Err(BenchError::IncompleteRun {
                recorded,
                expected: self.total_batches,
            });
        }
        Ok(RunReport {
            total_bytes: self.total_bytes,
            successes: self.successes,
            failures: self.failures,
            elapsed_ms: elapsed.as_millis() as u64,
            batch_size: self.batch_size,
            total_batches: self.total_batches,
        })
    }
}

/// Final aggregate of one run. Immutable once produced; always covers
/// every batch (successes + failures == total_batches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub total_bytes: u64,
    pub successes: u32,
    pub failures: u32,
    pub elapsed_ms: u64,
    pub batch_size: u32,
    pub total_batches: u32,
}

impl RunReport {
    pub fn total_kilobytes(&self) -> f64 {
        self.total_bytes as f64 / 1024.0
    }

    pub fn total_items(&self) -> u64 {
        self.total_batches as u64 * self.batch_size as u64
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}
