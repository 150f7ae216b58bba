//! Per-job error types.
//!
//! A job either returns its full serialized output or one of these errors.
//! There is no partial success: the pool never forwards a half-built or
//! zeroed payload.

use std::time::Duration;

use keyhose_crypto::DerivationError;
use keyhose_proto::ProtocolError;
use thiserror::Error;

/// Errors from running a single job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// No operation is registered under this name
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The job input could not be parsed by the operation
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Salt generation, key loading or HKDF failed
    #[error("derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    /// The response could not be serialized
    #[error("encoding failed: {0}")]
    Encoding(#[from] ProtocolError),

    /// The job did not finish within the pool's job timeout
    #[error("job timed out after {elapsed:?}")]
    TimedOut {
        /// How long the pool waited
        elapsed: Duration,
    },

    /// The pool has shut down
    #[error("worker pool is closed")]
    PoolClosed,

    /// The operation panicked
    #[error("worker panicked while running job")]
    WorkerPanicked,
}

impl JobError {
    /// Stable classification reported to callers.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnknownOperation(_) => "unknown_operation",
            Self::InvalidJob(_) => "invalid_job",
            Self::Derivation(err) => err.kind(),
            Self::Encoding(_) => "encoding_failure",
            Self::TimedOut { .. } => "timed_out",
            Self::PoolClosed => "pool_closed",
            Self::WorkerPanicked => "worker_panicked",
        }
    }

    /// Returns true if resubmitting the same job may succeed.
    ///
    /// The pool never retries on its own; callers decide.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Derivation(err) => err.is_transient(),
            Self::TimedOut { .. } | Self::PoolClosed => true,
            Self::UnknownOperation(_)
            | Self::InvalidJob(_)
            | Self::Encoding(_)
            | Self::WorkerPanicked => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_errors_keep_their_classification() {
        let err = JobError::from(DerivationError::EntropyUnavailable { reason: "eagain".into() });
        assert_eq!(err.error_type(), "entropy_unavailable");
        assert!(err.is_transient());

        let err = JobError::from(DerivationError::OutputLengthExceeded { requested: 9000, max: 8160 });
        assert_eq!(err.error_type(), "output_length_exceeded");
        assert!(!err.is_transient());
    }

    #[test]
    fn encoding_failures_are_classified() {
        let err = JobError::from(ProtocolError::EmptyField("secret"));
        assert_eq!(err.error_type(), "encoding_failure");
        assert_eq!(err.to_string(), "encoding failed: field `secret` must not be empty");
    }

    #[test]
    fn timeouts_are_transient() {
        let err = JobError::TimedOut { elapsed: Duration::from_secs(5) };
        assert_eq!(err.error_type(), "timed_out");
        assert!(err.is_transient());
    }

    #[test]
    fn unknown_operation_is_fatal() {
        let err = JobError::UnknownOperation("nothing".to_string());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "unknown operation: nothing");
    }
}
