//! CBOR encoding shared by every keyhose message.
//!
//! Messages are CBOR maps keyed by field name. Decoders ignore keys they do
//! not know, so a newer peer can add fields without breaking older ones, and
//! reject messages missing a required key.

use serde::{Serialize, Serializer, de::DeserializeOwned};

use crate::{
    MAX_MESSAGE_SIZE,
    errors::{ProtocolError, Result},
};

/// Serialize `value` to CBOR.
///
/// # Errors
///
/// - `ProtocolError::CborEncode` if serialization fails
/// - `ProtocolError::MessageTooLarge` if the encoding exceeds
///   [`MAX_MESSAGE_SIZE`]
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;

    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: buf.len(), max: MAX_MESSAGE_SIZE });
    }

    Ok(buf)
}

/// Borrowed slice that serializes as a CBOR byte string, as `Bytes` does.
///
/// Lets secret-bearing messages encode without an owned copy of the secret.
pub(crate) struct ByteStr<'a>(pub(crate) &'a [u8]);

impl Serialize for ByteStr<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// Deserialize a CBOR message.
///
/// The size check runs before the parser sees any input.
///
/// # Errors
///
/// - `ProtocolError::MessageTooLarge` if `bytes` exceeds [`MAX_MESSAGE_SIZE`]
/// - `ProtocolError::CborDecode` if `bytes` is not a valid `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE });
    }

    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}
