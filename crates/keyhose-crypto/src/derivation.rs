//! HKDF derivation (RFC 5869 extract-then-expand)
//!
//! SHA-256 unless the caller picks another [`HkdfHash`]. Every byte buffer is
//! a slice, so its length travels with it. Nothing here infers a length from
//! a handle.

use std::{fmt, str::FromStr};

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::error::DerivationError;

/// SHA-256 output length in bytes
pub const HASH_LEN: usize = 32;

/// Largest output HKDF-SHA256 can produce (255 blocks)
pub const MAX_OUTPUT_LEN: usize = 255 * HASH_LEN;

/// Derived secret length served by the `derive_secret` operation
pub const OKM_LEN: usize = 82;

/// Hash function behind HKDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HkdfHash {
    /// SHA-256, used by `derive_secret`
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HkdfHash {
    /// Lowercase name as accepted by [`HkdfHash::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha256 => HASH_LEN,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Largest output HKDF can produce with this hash (255 blocks).
    pub fn max_output_len(self) -> usize {
        255 * self.output_len()
    }
}

impl FromStr for HkdfHash {
    type Err = DerivationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(DerivationError::UnsupportedHash { name: name.to_string() }),
        }
    }
}

impl fmt::Display for HkdfHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output keying material.
///
/// Only ever constructed after a successful expansion, so holding one means
/// derivation ran to completion. Wiped on drop; `Debug` prints the length.
pub struct DerivedKeyMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl DerivedKeyMaterial {
    /// Derived bytes.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; zero-length output is rejected before derivation.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyMaterial").field("len", &self.len()).finish_non_exhaustive()
    }
}

/// Derive `output_length` bytes from `ikm` and `salt` with an empty info.
///
/// # Errors
///
/// See [`derive_with_info`].
pub fn derive(
    ikm: &[u8],
    salt: &[u8],
    output_length: usize,
) -> Result<DerivedKeyMaterial, DerivationError> {
    derive_with_info(ikm, salt, &[], output_length)
}

/// Derive `output_length` bytes from `ikm`, `salt` and a context `info`.
///
/// Requests are validated before anything is allocated.
///
/// # Errors
///
/// - `InvalidInputKeyMaterial` if `ikm` is empty
/// - `InvalidSalt` if `salt` is empty
/// - `ZeroOutputLength` if `output_length` is zero
/// - `OutputLengthExceeded` if `output_length > MAX_OUTPUT_LEN`
pub fn derive_with_info(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_length: usize,
) -> Result<DerivedKeyMaterial, DerivationError> {
    derive_with_hash(HkdfHash::Sha256, ikm, salt, info, output_length)
}

/// [`derive_with_info`] over a chosen hash.
///
/// The length ceiling is `hash.max_output_len()`.
///
/// # Errors
///
/// Same as [`derive_with_info`].
pub fn derive_with_hash(
    hash: HkdfHash,
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_length: usize,
) -> Result<DerivedKeyMaterial, DerivationError> {
    validate(hash, ikm, salt, output_length)?;

    let mut okm = Zeroizing::new(vec![0u8; output_length]);
    derive_into_with_hash(hash, ikm, salt, info, &mut okm)?;

    Ok(DerivedKeyMaterial { bytes: okm })
}

/// Derive into a caller-owned buffer; the output length is `out.len()`.
///
/// # Invariants
///
/// - Rejected requests leave `out` untouched
/// - Accepted requests zero-fill `out` before expansion
/// - If expansion fails `out` is zeroed again, never left half-written
///
/// # Errors
///
/// Same as [`derive_with_info`].
pub fn derive_into(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    out: &mut [u8],
) -> Result<(), DerivationError> {
    derive_into_with_hash(HkdfHash::Sha256, ikm, salt, info, out)
}

/// [`derive_into`] over a chosen hash. Same invariants.
///
/// # Errors
///
/// Same as [`derive_with_info`].
pub fn derive_into_with_hash(
    hash: HkdfHash,
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    out: &mut [u8],
) -> Result<(), DerivationError> {
    validate(hash, ikm, salt, out.len())?;

    out.fill(0);

    let expanded = match hash {
        HkdfHash::Sha256 => Hkdf::<Sha256>::new(Some(salt), ikm).expand(info, out),
        HkdfHash::Sha384 => Hkdf::<Sha384>::new(Some(salt), ikm).expand(info, out),
        HkdfHash::Sha512 => Hkdf::<Sha512>::new(Some(salt), ikm).expand(info, out),
    };

    if expanded.is_err() {
        out.zeroize();
        return Err(DerivationError::OutputLengthExceeded {
            requested: out.len(),
            max: hash.max_output_len(),
        });
    }

    Ok(())
}

fn validate(
    hash: HkdfHash,
    ikm: &[u8],
    salt: &[u8],
    output_length: usize,
) -> Result<(), DerivationError> {
    if ikm.is_empty() {
        return Err(DerivationError::InvalidInputKeyMaterial);
    }
    if salt.is_empty() {
        return Err(DerivationError::InvalidSalt);
    }
    if output_length == 0 {
        return Err(DerivationError::ZeroOutputLength);
    }
    let max = hash.max_output_len();
    if output_length > max {
        return Err(DerivationError::OutputLengthExceeded { requested: output_length, max });
    }
    Ok(())
}
