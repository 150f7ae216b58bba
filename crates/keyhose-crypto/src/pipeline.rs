//! The salt → HKDF pipeline behind `derive_secret`.
//!
//! [`SecretDeriver`] is built once per worker process and shared by every
//! worker thread. It holds only read-only state (the master key, the entropy
//! source handle and fixed parameters); salt and output buffers are allocated
//! per call, so concurrent calls never share a mutable buffer and no locking
//! is needed.

use std::sync::Arc;

use crate::{
    derivation::{self, DerivedKeyMaterial, MAX_OUTPUT_LEN, OKM_LEN},
    error::DerivationError,
    master_key::MasterKeyMaterial,
    salt::{self, EntropySource, SALT_LEN, Salt},
};

/// Fixed per-process derivation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationParams {
    /// Salt length in bytes
    pub salt_len: usize,
    /// Derived secret length in bytes
    pub output_len: usize,
    /// HKDF info (context) parameter; empty by default
    pub info: Vec<u8>,
}

impl Default for DerivationParams {
    fn default() -> Self {
        Self { salt_len: SALT_LEN, output_len: OKM_LEN, info: Vec::new() }
    }
}

impl DerivationParams {
    /// Check the parameters once at startup rather than on every call.
    pub fn validate(&self) -> Result<(), DerivationError> {
        if self.salt_len == 0 {
            return Err(DerivationError::InvalidSalt);
        }
        if self.output_len == 0 {
            return Err(DerivationError::ZeroOutputLength);
        }
        if self.output_len > MAX_OUTPUT_LEN {
            return Err(DerivationError::OutputLengthExceeded {
                requested: self.output_len,
                max: MAX_OUTPUT_LEN,
            });
        }
        Ok(())
    }
}

/// Salt plus the secret derived with it.
#[derive(Debug)]
pub struct DerivedSecret {
    /// Fresh salt used for this derivation
    pub salt: Salt,
    /// HKDF output
    pub secret: DerivedKeyMaterial,
}

/// Derives fresh secrets from a shared master key.
pub struct SecretDeriver<E> {
    master: Arc<MasterKeyMaterial>,
    entropy: E,
    params: DerivationParams,
}

impl<E: EntropySource> SecretDeriver<E> {
    /// Build a deriver.
    ///
    /// # Errors
    ///
    /// - Any error from [`DerivationParams::validate`]
    pub fn new(
        master: Arc<MasterKeyMaterial>,
        entropy: E,
        params: DerivationParams,
    ) -> Result<Self, DerivationError> {
        params.validate()?;
        Ok(Self { master, entropy, params })
    }

    /// Parameters in use.
    pub fn params(&self) -> &DerivationParams {
        &self.params
    }

    /// Generate a fresh salt and derive a secret from it.
    ///
    /// Salt is generated first. If the entropy source fails the call returns
    /// before HKDF runs, so a missing or garbage salt can never reach the
    /// engine.
    pub fn derive_secret(&self) -> Result<DerivedSecret, DerivationError> {
        let salt = salt::generate_salt(&self.entropy, self.params.salt_len)?;

        let secret = derivation::derive_with_info(
            self.master.expose(),
            salt.as_bytes(),
            &self.params.info,
            self.params.output_len,
        )?;

        Ok(DerivedSecret { salt, secret })
    }
}
