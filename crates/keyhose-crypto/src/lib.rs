//! keyhose Cryptographic Core
//!
//! Secret derivation for keyhose workers: a master key loaded once at
//! startup, a fresh OS-random salt per call, and HKDF-SHA256 over both.
//!
//! ```text
//! MasterKeySource ──load once──▶ Arc<MasterKeyMaterial> (IKM)
//!                                        │
//! EntropySource ──16 bytes──▶ Salt       │
//!                              │         │
//!                              ▼         ▼
//!                        HKDF-SHA256 extract + expand
//!                                   │
//!                                   ▼
//!                        DerivedKeyMaterial (82 bytes)
//! ```
//!
//! The caller receives the salt and the derived secret. Given the master key,
//! the salt is enough to reproduce the secret later.
//!
//! # Security
//!
//! Salt:
//! - Sourced from the OS CSPRNG on every call, never from a seeded PRNG
//! - Entropy failure aborts the call before HKDF runs
//!
//! Key material:
//! - Master key and derived output are zeroized on drop
//! - `Debug` output for secret types shows lengths only
//! - The master key never leaves this crate except as HKDF input
//!
//! Buffers:
//! - Every buffer is a length-carrying slice or container
//! - Output buffers are zero-filled before expansion and re-zeroed on failure
//! - Invalid requests are rejected before any output is written

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod derivation;
pub mod error;
pub mod master_key;
pub mod pipeline;
pub mod salt;

pub use derivation::{
    DerivedKeyMaterial, HASH_LEN, HkdfHash, MAX_OUTPUT_LEN, OKM_LEN, derive, derive_into,
    derive_into_with_hash, derive_with_hash, derive_with_info,
};
pub use error::DerivationError;
pub use master_key::{
    EnvMasterKey, FileMasterKey, MASTER_KEY_LEN, MasterKeyMaterial, MasterKeySource,
    StaticMasterKey, load_master_key, reference_master_key,
};
pub use pipeline::{DerivationParams, DerivedSecret, SecretDeriver};
pub use salt::{EntropySource, OsEntropy, SALT_LEN, Salt, generate_salt};
