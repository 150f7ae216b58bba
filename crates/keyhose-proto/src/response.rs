//! The `derive_secret` response payload.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, ByteStr},
    errors::{ProtocolError, Result},
};

/// Salt and the secret derived from it.
///
/// Encoded as the CBOR map `{ "salt": bstr, "secret": bstr }`. Both fields are
/// required and non-empty. Values are write-once: there are no setters, and
/// the only constructors are [`DerivationResponse::new`] and
/// [`DerivationResponse::decode`], which both enforce presence.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationResponse {
    salt: Bytes,
    secret: Bytes,
}

impl DerivationResponse {
    /// Build a response.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyField` if either field is empty
    pub fn new(salt: impl Into<Bytes>, secret: impl Into<Bytes>) -> Result<Self> {
        let response = Self { salt: salt.into(), secret: secret.into() };
        response.check()?;
        Ok(response)
    }

    /// Encode a response straight from borrowed buffers.
    ///
    /// Produces the same bytes as `new(salt, secret)?.encode()` but never
    /// takes an owned copy of `secret`. The returned encoding is the only
    /// copy left behind, and it is the reply that leaves the process.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyField` if either field is empty
    /// - `ProtocolError::CborEncode` / `MessageTooLarge` as for [`Self::encode`]
    pub fn encode_parts(salt: &[u8], secret: &[u8]) -> Result<Vec<u8>> {
        if salt.is_empty() {
            return Err(ProtocolError::EmptyField("salt"));
        }
        if secret.is_empty() {
            return Err(ProtocolError::EmptyField("secret"));
        }
        codec::encode(&ResponseView { salt: ByteStr(salt), secret: ByteStr(secret) })
    }

    /// Salt bytes.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Derived secret bytes.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Serialize for the caller.
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Parse a response.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if a field is missing or malformed
    /// - `ProtocolError::EmptyField` if a field is present but empty
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let response: Self = codec::decode(bytes)?;
        response.check()?;
        Ok(response)
    }

    fn check(&self) -> Result<()> {
        if self.salt.is_empty() {
            return Err(ProtocolError::EmptyField("salt"));
        }
        if self.secret.is_empty() {
            return Err(ProtocolError::EmptyField("secret"));
        }
        Ok(())
    }
}

/// Borrowed twin of [`DerivationResponse`]; field names and order must match.
#[derive(Serialize)]
struct ResponseView<'a> {
    salt: ByteStr<'a>,
    secret: ByteStr<'a>,
}

impl fmt::Debug for DerivationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivationResponse")
            .field("salt", &self.salt)
            .field("secret_len", &self.secret.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_fields() {
        assert_eq!(
            DerivationResponse::new(Vec::<u8>::new(), vec![1u8]),
            Err(ProtocolError::EmptyField("salt"))
        );
        assert_eq!(
            DerivationResponse::new(vec![1u8], Vec::<u8>::new()),
            Err(ProtocolError::EmptyField("secret"))
        );
    }

    #[test]
    fn encode_then_decode() {
        let response = DerivationResponse::new(vec![0x11; 16], vec![0x22; 82]).unwrap();
        let decoded = DerivationResponse::decode(&response.encode().unwrap()).unwrap();

        assert_eq!(decoded.salt(), &[0x11; 16]);
        assert_eq!(decoded.secret(), &[0x22; 82]);
    }

    #[test]
    fn byte_fields_encode_as_byte_strings() {
        let response = DerivationResponse::new(vec![0xAA], vec![0xBB, 0xCC]).unwrap();
        let bytes = response.encode().unwrap();

        // map(2) { "salt": h'AA', "secret": h'BBCC' }
        let expected = [
            0xa2, 0x64, b's', b'a', b'l', b't', 0x41, 0xAA, 0x66, b's', b'e', b'c', b'r', b'e',
            b't', 0x42, 0xBB, 0xCC,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn borrowed_encoding_matches_owned() {
        let salt = [0x11; 16];
        let secret = [0x22; 82];

        let owned = DerivationResponse::new(salt.to_vec(), secret.to_vec()).unwrap();
        let borrowed = DerivationResponse::encode_parts(&salt, &secret).unwrap();
        assert_eq!(borrowed, owned.encode().unwrap());

        let decoded = DerivationResponse::decode(&borrowed).unwrap();
        assert_eq!(decoded, owned);
    }

    #[test]
    fn borrowed_encoding_rejects_empty_fields() {
        assert_eq!(
            DerivationResponse::encode_parts(&[], &[1]),
            Err(ProtocolError::EmptyField("salt"))
        );
        assert_eq!(
            DerivationResponse::encode_parts(&[1], &[]),
            Err(ProtocolError::EmptyField("secret"))
        );
    }

    #[test]
    fn debug_hides_secret() {
        let response = DerivationResponse::new(vec![1], vec![0x5e; 3]).unwrap();
        let rendered = format!("{response:?}");
        assert!(rendered.contains("secret_len: 3"));
        assert!(!rendered.contains("^^^"), "secret bytes must not be rendered");
    }
}
