//! Error types for secret derivation

use thiserror::Error;

/// Errors from the derivation core.
///
/// Every variant is fatal to the call that produced it. Nothing here is
/// retried internally and no variant is ever replaced with default or zeroed
/// output. Messages never contain key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// The OS entropy source could not be read
    #[error("entropy unavailable: {reason}")]
    EntropyUnavailable {
        /// Why the entropy source failed
        reason: String,
    },

    /// Input keying material was empty
    #[error("input keying material must not be empty")]
    InvalidInputKeyMaterial,

    /// HKDF salt was empty
    #[error("salt must not be empty")]
    InvalidSalt,

    /// A zero-length output was requested
    #[error("output length must be non-zero")]
    ZeroOutputLength,

    /// Requested output is longer than HKDF can produce for the hash
    #[error("output length {requested} exceeds HKDF maximum of {max}")]
    OutputLengthExceeded {
        /// Requested output length in bytes
        requested: usize,
        /// Maximum output length in bytes (255 * hash length)
        max: usize,
    },

    /// The named hash function is not supported for HKDF
    #[error("unsupported HKDF hash: {name}")]
    UnsupportedHash {
        /// Name as given by the caller
        name: String,
    },

    /// The master key could not be obtained from its backend
    #[error("master key source unavailable: {reason}")]
    KeySourceUnavailable {
        /// Why the backend failed (never includes key bytes)
        reason: String,
    },
}

impl DerivationError {
    /// Stable snake_case classification reported across the worker boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntropyUnavailable { .. } => "entropy_unavailable",
            Self::InvalidInputKeyMaterial => "invalid_input_key_material",
            Self::InvalidSalt => "invalid_salt",
            Self::ZeroOutputLength => "zero_output_length",
            Self::OutputLengthExceeded { .. } => "output_length_exceeded",
            Self::UnsupportedHash { .. } => "unsupported_hash",
            Self::KeySourceUnavailable { .. } => "key_source_unavailable",
        }
    }

    /// Returns true if a later attempt may succeed.
    ///
    /// Only entropy starvation is environmental. Everything else is a bad
    /// request or a misconfigured deployment and will fail again. The core
    /// never retries; this is a hint for the layer above.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EntropyUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_entropy_failures_are_transient() {
        assert!(DerivationError::EntropyUnavailable { reason: "eagain".into() }.is_transient());
        assert!(!DerivationError::InvalidSalt.is_transient());
        assert!(!DerivationError::KeySourceUnavailable { reason: "missing".into() }.is_transient());
        assert!(
            !DerivationError::OutputLengthExceeded { requested: 9000, max: 8160 }.is_transient()
        );
    }

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            DerivationError::EntropyUnavailable { reason: String::new() },
            DerivationError::InvalidInputKeyMaterial,
            DerivationError::InvalidSalt,
            DerivationError::ZeroOutputLength,
            DerivationError::OutputLengthExceeded { requested: 0, max: 0 },
            DerivationError::UnsupportedHash { name: String::new() },
            DerivationError::KeySourceUnavailable { reason: String::new() },
        ];

        let mut kinds: Vec<_> = errors.iter().map(DerivationError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn error_display() {
        let err = DerivationError::OutputLengthExceeded { requested: 8161, max: 8160 };
        assert_eq!(err.to_string(), "output length 8161 exceeds HKDF maximum of 8160");

        let err = DerivationError::EntropyUnavailable { reason: "os error 11".to_string() };
        assert_eq!(err.to_string(), "entropy unavailable: os error 11");
    }
}
