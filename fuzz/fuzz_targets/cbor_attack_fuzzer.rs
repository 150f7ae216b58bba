//! Fuzz target for CBOR deserialization attacks
//!
//! Every byte a client sends is decoded as one of the keyhose messages before
//! any operation runs, so the decoders are the worker's attack surface.
//!
//! # Strategy
//!
//! - Deeply nested: Arrays/maps nested to arbitrary depth (stack overflow)
//! - Huge lengths: CBOR claiming massive byte/string/array lengths (memory)
//! - Random bytes: Completely arbitrary CBOR data (general malformation)
//! - Wrong message: A valid message decoded as every other message type
//! - Duplicate keys: CBOR maps with repeated field names
//!
//! # Invariants
//!
//! - Deserialization completes quickly (no infinite loops)
//! - Huge claimed lengths rejected (not allocated)
//! - A decoded `DerivationResponse` never has an empty salt or secret
//! - NEVER panic on malformed CBOR

#![no_main]

use arbitrary::Arbitrary;
use keyhose_proto::{
    DerivateKeyRequest, DerivateKeyResponse, DerivationResponse, JobReply, JobRequest,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum CborAttack {
    DeeplyNested { depth: u8, payload_type: PayloadType },
    HugeLength { claimed_len_exponent: u8 },
    RandomBytes { bytes: Vec<u8> },
    WrongMessage { operation: String, data: Vec<u8> },
    DuplicateKeys { count: u8, field: Field },
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadType {
    Array,
    Map,
    Bytes,
    String,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Field {
    Salt,
    Secret,
    Operation,
}

impl Field {
    fn name(self) -> &'static [u8] {
        match self {
            Field::Salt => b"salt",
            Field::Secret => b"secret",
            Field::Operation => b"operation",
        }
    }
}

fuzz_target!(|attack: CborAttack| {
    match attack {
        CborAttack::DeeplyNested { depth, payload_type } => {
            let actual_depth = (depth % 50) as usize;
            decode_all(&create_nested_cbor(actual_depth, &payload_type));
        }

        CborAttack::HugeLength { claimed_len_exponent } => {
            let exponent = (claimed_len_exponent % 21) as u32;
            let claimed_length = if exponent < 20 { 1u32 << exponent } else { u32::MAX };

            for cbor_bytes in [
                create_huge_byte_string(claimed_length),
                create_huge_text_string(claimed_length),
                create_huge_array(claimed_length),
                create_response_with_huge_salt(claimed_length),
            ] {
                decode_all(&cbor_bytes);
            }
        }

        CborAttack::RandomBytes { bytes } => decode_all(&bytes),

        CborAttack::WrongMessage { operation, data } => {
            if let Ok(bytes) = JobRequest::new(operation, data).encode() {
                decode_all(&bytes);
            }
        }

        CborAttack::DuplicateKeys { count, field } => {
            let actual_count = (count % 10).max(2);
            let name = field.name();
            let mut cbor_bytes = vec![0xA0 | actual_count];

            for _ in 0..actual_count {
                cbor_bytes.push(0x60 | name.len() as u8);
                cbor_bytes.extend_from_slice(name);
                cbor_bytes.push(0x41);
                cbor_bytes.push(0x01);
            }

            decode_all(&cbor_bytes);
        }
    }
});

fn decode_all(bytes: &[u8]) {
    if let Ok(response) = DerivationResponse::decode(bytes) {
        assert!(!response.salt().is_empty(), "decoded response with empty salt");
        assert!(!response.secret().is_empty(), "decoded response with empty secret");
    }
    let _ = JobRequest::decode(bytes);
    let _ = JobReply::decode(bytes);
    let _ = DerivateKeyRequest::decode(bytes);
    let _ = DerivateKeyResponse::decode(bytes);
}

fn create_nested_cbor(depth: usize, payload_type: &PayloadType) -> Vec<u8> {
    let mut bytes = Vec::new();

    match payload_type {
        PayloadType::Array => {
            for _ in 0..depth {
                bytes.push(0x81);
            }
            bytes.push(0x01);
        }
        PayloadType::Map => {
            for _ in 0..depth {
                bytes.push(0xA1);
                bytes.push(0x64);
                bytes.extend_from_slice(b"salt");
            }
            bytes.push(0x01);
        }
        PayloadType::Bytes => {
            for _ in 0..depth {
                bytes.push(0x81);
            }
            bytes.push(0x41);
            bytes.push(0x00);
        }
        PayloadType::String => {
            for _ in 0..depth {
                bytes.push(0x81);
            }
            bytes.push(0x61);
            bytes.push(b'x');
        }
    }

    bytes
}

fn create_huge_byte_string(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0x5A];
    bytes.extend_from_slice(&claimed_length.to_be_bytes());
    bytes.extend(vec![0xAA; (claimed_length as usize).min(10)]);
    bytes
}

fn create_huge_text_string(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0x7A];
    bytes.extend_from_slice(&claimed_length.to_be_bytes());
    bytes.extend(vec![b'x'; (claimed_length as usize).min(10)]);
    bytes
}

fn create_huge_array(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0x9A];
    bytes.extend_from_slice(&claimed_length.to_be_bytes());
    for _ in 0..(claimed_length as usize).min(5) {
        bytes.push(0x01);
    }
    bytes
}

/// `{"salt": <claimed_length bytes>, ...}` with the body cut short.
fn create_response_with_huge_salt(claimed_length: u32) -> Vec<u8> {
    let mut bytes = vec![0xA2, 0x64];
    bytes.extend_from_slice(b"salt");
    bytes.extend(create_huge_byte_string(claimed_length));
    bytes.push(0x66);
    bytes.extend_from_slice(b"secret");
    bytes.extend_from_slice(&[0x41, 0x01]);
    bytes
}
