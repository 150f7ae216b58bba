//! Master key material and the backends that supply it.
//!
//! The master key is the HKDF input keying material. It is loaded once when a
//! worker starts and then shared read-only (`Arc<MasterKeyMaterial>`) by every
//! derivation for the lifetime of the process. There is no mutation path.
//!
//! Backends implement [`MasterKeySource`]. A backend that cannot produce a key
//! fails with [`DerivationError::KeySourceUnavailable`]; callers must abort
//! rather than fall back to another key.

use std::{env, fmt, path::PathBuf, sync::Arc};

use zeroize::Zeroizing;

use crate::error::DerivationError;

/// Length of the built-in reference master key
pub const MASTER_KEY_LEN: usize = 80;

/// Secret input keying material.
///
/// Wiped from memory on drop. `Debug` prints the length only, so the key can
/// sit inside structs that derive `Debug` without leaking into logs.
#[derive(Clone)]
pub struct MasterKeyMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterKeyMaterial {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidInputKeyMaterial` if `bytes` is empty
    pub fn new(bytes: Vec<u8>) -> Result<Self, DerivationError> {
        if bytes.is_empty() {
            return Err(DerivationError::InvalidInputKeyMaterial);
        }

        Ok(Self { bytes: Zeroizing::new(bytes) })
    }

    /// Parse a hex-encoded key. Surrounding whitespace is ignored.
    ///
    /// The error message never echoes the offending input.
    pub fn from_hex(encoded: &str) -> Result<Self, DerivationError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| {
            DerivationError::KeySourceUnavailable {
                reason: "master key is not valid hex".to_string(),
            }
        })?;

        Self::new(bytes).map_err(|_| DerivationError::KeySourceUnavailable {
            reason: "master key is empty".to_string(),
        })
    }

    /// Raw key bytes. Only the derivation engine should need this.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty keys are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for MasterKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyMaterial").field("len", &self.len()).finish_non_exhaustive()
    }
}

/// The 80-byte reference key `0x00, 0x01, ..., 0x4f`.
///
/// Placeholder for development and tests. Production deployments load the
/// key from [`FileMasterKey`] or [`EnvMasterKey`].
pub fn reference_master_key() -> MasterKeyMaterial {
    let bytes: Vec<u8> = (0..MASTER_KEY_LEN as u8).collect();
    MasterKeyMaterial { bytes: Zeroizing::new(bytes) }
}

/// A capability that produces the master key.
///
/// Called once at worker start. Implementations may block (disk, network).
pub trait MasterKeySource: Send + Sync {
    /// Produce the master key.
    ///
    /// # Errors
    ///
    /// - `KeySourceUnavailable` if the backend cannot supply a usable key
    fn load(&self) -> Result<MasterKeyMaterial, DerivationError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Load the master key from `source`, once, for sharing across workers.
pub fn load_master_key(
    source: &dyn MasterKeySource,
) -> Result<Arc<MasterKeyMaterial>, DerivationError> {
    match source.load() {
        Ok(key) => {
            tracing::info!(source = source.name(), len = key.len(), "master key loaded");
            Ok(Arc::new(key))
        },
        Err(e) => {
            tracing::error!(source = source.name(), error = %e, "master key unavailable");
            Err(e)
        },
    }
}

/// Fixed in-process key bytes.
pub struct StaticMasterKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl StaticMasterKey {
    /// Serve the given bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Zeroizing::new(bytes) }
    }

    /// Serve [`reference_master_key`].
    pub fn reference() -> Self {
        Self::new((0..MASTER_KEY_LEN as u8).collect())
    }
}

impl MasterKeySource for StaticMasterKey {
    fn load(&self) -> Result<MasterKeyMaterial, DerivationError> {
        MasterKeyMaterial::new(self.bytes.to_vec()).map_err(|_| {
            DerivationError::KeySourceUnavailable { reason: "static key is empty".to_string() }
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Hex-encoded key read from an environment variable.
pub struct EnvMasterKey {
    var: String,
}

impl EnvMasterKey {
    /// Read the key from `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl MasterKeySource for EnvMasterKey {
    fn load(&self) -> Result<MasterKeyMaterial, DerivationError> {
        let value = env::var(&self.var).map_err(|e| {
            let reason = match e {
                env::VarError::NotPresent => {
                    format!("environment variable {} is not set", self.var)
                },
                env::VarError::NotUnicode(_) => {
                    format!("environment variable {} is not valid unicode", self.var)
                },
            };
            DerivationError::KeySourceUnavailable { reason }
        })?;

        let value = Zeroizing::new(value);
        MasterKeyMaterial::from_hex(&value)
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// Raw key bytes read from a file.
pub struct FileMasterKey {
    path: PathBuf,
}

impl FileMasterKey {
    /// Read the key from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MasterKeySource for FileMasterKey {
    fn load(&self) -> Result<MasterKeyMaterial, DerivationError> {
        let bytes = std::fs::read(&self.path).map_err(|e| DerivationError::KeySourceUnavailable {
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;

        MasterKeyMaterial::new(bytes).map_err(|_| DerivationError::KeySourceUnavailable {
            reason: format!("{} is empty", self.path.display()),
        })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
