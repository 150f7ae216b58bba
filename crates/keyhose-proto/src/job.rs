//! Job envelopes exchanged with the worker front end.
//!
//! A client sends one [`JobRequest`] per stream naming the operation to run
//! and its opaque input. The worker answers with one [`JobReply`]: either
//! `ok` with the operation's output, or `failed` with an error
//! classification and message and an empty result.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{codec, errors::Result};

/// Request to run a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Registered operation name, e.g. `derive_secret`
    pub operation: String,
    /// Opaque operation input
    pub data: Bytes,
}

impl JobRequest {
    /// Create a request.
    pub fn new(operation: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { operation: operation.into(), data: data.into() }
    }

    /// Serialize for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Parse from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }
}

/// Outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The operation succeeded; `result` holds its output
    Ok,
    /// The operation failed; `error_type` and `error` describe why
    Failed,
}

/// Reply to a [`JobRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReply {
    /// Outcome
    pub status: JobStatus,
    /// Operation output; empty unless `status` is `Ok`
    pub result: Bytes,
    /// Stable error classification, e.g. `entropy_unavailable`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Human-readable error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobReply {
    /// Successful reply carrying `result`.
    pub fn ok(result: impl Into<Bytes>) -> Self {
        Self { status: JobStatus::Ok, result: result.into(), error_type: None, error: None }
    }

    /// Failed reply. The result is always empty.
    pub fn failed(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result: Bytes::new(),
            error_type: Some(error_type.into()),
            error: Some(message.into()),
        }
    }

    /// True if the job succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == JobStatus::Ok
    }

    /// Split into the result or the failure.
    pub fn into_result(self) -> std::result::Result<Bytes, JobFailure> {
        match self.status {
            JobStatus::Ok => Ok(self.result),
            JobStatus::Failed => Err(JobFailure {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_default(),
            }),
        }
    }

    /// Serialize for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Parse from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }
}

/// A failed job as seen by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error_type}: {message}")]
pub struct JobFailure {
    /// Stable error classification
    pub error_type: String,
    /// Human-readable message
    pub message: String,
}
