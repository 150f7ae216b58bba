//! Single-use salt generation.
//!
//! Salt comes from an [`EntropySource`]. Production uses [`OsEntropy`], which
//! reads the operating system CSPRNG through getrandom (`getrandom(2)` on
//! Linux, `BCryptGenRandom` on Windows). There is no fallback: if the OS
//! cannot supply randomness the call fails with
//! [`DerivationError::EntropyUnavailable`]. A weaker source would let salts
//! repeat across calls with the same master key.

use std::{
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use crate::error::DerivationError;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// A source of cryptographically secure random bytes.
///
/// # Invariants
///
/// - On `Ok(())` every byte of `buf` has been overwritten
/// - Production implementations are never seeded or deterministic
pub trait EntropySource: Send + Sync {
    /// Fill `buf` with random bytes.
    ///
    /// # Errors
    ///
    /// - `EntropyUnavailable` if the source cannot be read
    fn fill(&self, buf: &mut [u8]) -> Result<(), DerivationError>;
}

impl<E: EntropySource + ?Sized> EntropySource for Arc<E> {
    fn fill(&self, buf: &mut [u8]) -> Result<(), DerivationError> {
        (**self).fill(buf)
    }
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl OsEntropy {
    /// Create an OS entropy source without probing it.
    pub fn new() -> Self {
        Self
    }

    /// Create an OS entropy source once the kernel pool is seeded.
    ///
    /// `getrandom` only blocks while the OS pool is uninitialized (early
    /// boot, fresh VMs). The probe runs on a helper thread so a starved pool
    /// surfaces as `EntropyUnavailable` after `timeout` instead of hanging
    /// worker startup. Once this returns `Ok`, later reads do not block.
    pub fn ready(timeout: Duration) -> Result<Self, DerivationError> {
        let (tx, rx) = mpsc::sync_channel(1);

        thread::Builder::new()
            .name("keyhose-entropy-probe".to_string())
            .spawn(move || {
                let mut probe = [0u8; 1];
                let _ = tx.send(getrandom::fill(&mut probe).map_err(|e| e.to_string()));
            })
            .map_err(|e| DerivationError::EntropyUnavailable {
                reason: format!("failed to spawn entropy probe: {e}"),
            })?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(Self),
            Ok(Err(reason)) => Err(DerivationError::EntropyUnavailable { reason }),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DerivationError::EntropyUnavailable {
                reason: format!("OS entropy pool not ready after {timeout:?}"),
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(DerivationError::EntropyUnavailable {
                    reason: "entropy probe exited without a result".to_string(),
                })
            },
        }
    }
}

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), DerivationError> {
        getrandom::fill(buf)
            .map_err(|e| DerivationError::EntropyUnavailable { reason: e.to_string() })
    }
}

/// Public, single-use HKDF salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt {
    bytes: Vec<u8>,
}

impl Salt {
    /// Salt bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Salt length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty salts are never constructed.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume into the underlying bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

/// Generate `length` bytes of fresh salt from `source`.
///
/// The buffer is zero-allocated and only handed out after `source` filled
/// it. On failure it is dropped; the caller never sees partial salt.
///
/// # Errors
///
/// - `InvalidSalt` if `length` is zero
/// - `EntropyUnavailable` if `source` fails
pub fn generate_salt<E: EntropySource + ?Sized>(
    source: &E,
    length: usize,
) -> Result<Salt, DerivationError> {
    if length == 0 {
        return Err(DerivationError::InvalidSalt);
    }

    let mut bytes = vec![0u8; length];
    source.fill(&mut bytes)?;

    Ok(Salt { bytes })
}
