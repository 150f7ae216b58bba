//! Payloads for `derivate_key`: HKDF over caller-supplied inputs.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, ByteStr},
    errors::Result,
};

/// Hash used when a request does not name one.
pub const DEFAULT_HASH: &str = "sha256";

fn default_hash() -> String {
    DEFAULT_HASH.to_string()
}

/// Derive `length` bytes from caller-supplied key material.
///
/// `info` is optional on the wire and defaults to empty. `hash` is optional
/// and defaults to [`DEFAULT_HASH`]; the worker decides which names it
/// accepts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivateKeyRequest {
    /// Input keying material
    pub ikm: Bytes,
    /// HKDF salt
    pub salt: Bytes,
    /// HKDF info (context) parameter
    #[serde(default)]
    pub info: Bytes,
    /// Output length in bytes
    pub length: u32,
    /// HKDF hash name (`sha256`, `sha384`, `sha512`)
    #[serde(default = "default_hash")]
    pub hash: String,
}

impl DerivateKeyRequest {
    /// Serialize for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Parse from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }
}

impl fmt::Debug for DerivateKeyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivateKeyRequest")
            .field("ikm_len", &self.ikm.len())
            .field("salt", &self.salt)
            .field("info", &self.info)
            .field("length", &self.length)
            .field("hash", &self.hash)
            .finish()
    }
}

/// Output keying material from `derivate_key`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivateKeyResponse {
    /// Derived bytes
    pub okm: Bytes,
}

impl DerivateKeyResponse {
    /// Serialize for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Encode a response straight from borrowed output keying material.
    ///
    /// Same bytes as [`Self::encode`], without an owned copy of `okm`.
    pub fn encode_okm(okm: &[u8]) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct View<'a> {
            okm: ByteStr<'a>,
        }

        codec::encode(&View { okm: ByteStr(okm) })
    }

    /// Parse from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }
}

impl fmt::Debug for DerivateKeyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivateKeyResponse").field("okm_len", &self.okm.len()).finish()
    }
}
