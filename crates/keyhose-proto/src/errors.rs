//! Wire protocol errors.

use thiserror::Error;

/// Result alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from encoding or decoding keyhose messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Serialization failed
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// Input is not a valid message of the expected type
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),

    /// Message exceeds [`crate::MAX_MESSAGE_SIZE`]
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        max: usize,
    },

    /// A required byte field is empty
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}
