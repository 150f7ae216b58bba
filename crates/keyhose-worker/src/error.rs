//! Worker runtime error types.

use std::fmt;

use keyhose_crypto::DerivationError;
use keyhose_proto::{JobFailure, ProtocolError};

/// Errors that can occur while starting or running a worker.
#[derive(Debug)]
pub enum WorkerError {
    /// Configuration error (invalid bind address, pool size, TLS files, etc.).
    ///
    /// These are fatal errors that prevent worker startup. Fix configuration
    /// and restart.
    Config(String),

    /// Master key could not be loaded or derivation parameters are invalid.
    ///
    /// Fatal at startup. The worker never substitutes a default key.
    KeySource(DerivationError),

    /// Transport/network error (connection failure, stream I/O, etc.).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Transport(String),

    /// Protocol error (malformed envelope, oversized message).
    ///
    /// Fatal for that stream; the worker keeps serving other streams.
    Protocol(String),

    /// A remote job failed (client side).
    ///
    /// Carries the classification the worker reported.
    Job(JobFailure),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::KeySource(err) => write!(f, "key source error: {err}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Job(failure) => write!(f, "job failed: {failure}"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KeySource(err) => Some(err),
            Self::Job(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<DerivationError> for WorkerError {
    fn from(err: DerivationError) -> Self {
        Self::KeySource(err)
    }
}

impl From<ProtocolError> for WorkerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
