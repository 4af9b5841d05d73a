use thiserror::Error;

/// Cause of a single batch failing. These never abort the run; the
/// dispatcher records them as failure outcomes and keeps scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendErrorKind {
    #[error("network error: {0}")]
    Transport(String),
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("no response within deadline")]
    Timeout,
    #[error("payload serialization failed: {0}")]
    Serialization(String),
}

impl SendErrorKind {
    /// Whether a retry could plausibly succeed. No retry is performed;
    /// the flag is carried on the outcome for downstream consumers.
    pub fn retryable(&self) -> bool {
        match self {
            SendErrorKind::Transport(_) | SendErrorKind::Timeout => true,
            SendErrorKind::Status(code) => *code >= 500,
            SendErrorKind::Serialization(_) => false,
        }
    }
}

/// Fatal benchmark errors. `Setup` surfaces before any batch is
/// scheduled; the aggregator variants signal caller bugs, not runtime
/// conditions expected in normal operation.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("setup error: {0}")]
    Setup(String),
    #[error("report finalized after {recorded} of {expected} outcomes")]
    IncompleteRun { recorded: u32, expected: u32 },
    #[error("outcome for batch {index} recorded twice")]
    DuplicateOutcome { index: u32 },
    #[error("outcome for unknown batch {index}")]
    UnknownBatch { index: u32 },
    #[error("benchmark task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SendErrorKind::Transport("connection refused".into()).retryable());
        assert!(SendErrorKind::Timeout.retryable());
        assert!(SendErrorKind::Status(503).retryable());
        assert!(!SendErrorKind::Status(422).retryable());
        assert!(!SendErrorKind::Serialization("bad value".into()).retryable());
    }
}
