//! keyhose wire protocol.
//!
//! All messages are CBOR maps keyed by field name. CBOR is self-describing,
//! compact and needs no code generation; keying by name rather than position
//! means fields can be added later without breaking existing peers.
//!
//! # Messages
//!
//! - [`JobRequest`] / [`JobReply`]: the envelope for one job on one stream
//! - [`DerivationResponse`]: `derive_secret` output (`salt`, `secret`)
//! - [`DerivateKeyRequest`] / [`DerivateKeyResponse`]: `derivate_key` input
//!   and output
//!
//! # Invariants
//!
//! - Byte fields are CBOR byte strings
//! - Decoding checks [`MAX_MESSAGE_SIZE`] before parsing
//! - Required fields that are absent fail decoding; unknown fields are
//!   ignored

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod derivate;
pub mod errors;
pub mod job;
pub mod response;

pub use derivate::{DEFAULT_HASH, DerivateKeyRequest, DerivateKeyResponse};
pub use errors::{ProtocolError, Result};
pub use job::{JobFailure, JobReply, JobRequest, JobStatus};
pub use response::DerivationResponse;

/// ALPN protocol identifier for the QUIC front end
pub const ALPN_PROTOCOL: &[u8] = b"keyhose/1";

/// Largest message accepted or produced (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
