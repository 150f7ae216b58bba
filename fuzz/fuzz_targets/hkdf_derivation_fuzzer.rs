//! Fuzz target for HKDF derivation
//!
//! Drives the derivation engine with adversarial key material, salts, info
//! strings and output lengths.
//!
//! # Strategy
//!
//! - Arbitrary key material (empty, short, 80-byte master size, large)
//! - Empty, short and long salts
//! - Output lengths around the boundaries (0, 1, 32, 82, 8160, 8161, huge)
//! - Caller-owned output buffers pre-filled with garbage
//!
//! # Invariants
//!
//! - Derivation is deterministic (same inputs → same output)
//! - Accepted requests produce exactly the requested length
//! - Rejected requests leave the caller's buffer untouched
//! - A different salt gives a different output
//! - NEVER panic

#![no_main]

use arbitrary::Arbitrary;
use keyhose_crypto::{derive_into, derive_with_info, MASTER_KEY_LEN, MAX_OUTPUT_LEN, OKM_LEN};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct DerivationScenario {
    ikm: KeyMaterial,
    salt: Vec<u8>,
    info: Vec<u8>,
    length: OutputLength,
    /// Byte the caller's buffer is pre-filled with
    garbage: u8,
}

#[derive(Debug, Clone, Arbitrary)]
enum KeyMaterial {
    Empty,
    Short([u8; 8]),
    Master([u8; MASTER_KEY_LEN]),
    Arbitrary(Vec<u8>),
}

impl KeyMaterial {
    fn as_bytes(&self) -> &[u8] {
        match self {
            KeyMaterial::Empty => &[],
            KeyMaterial::Short(b) => b,
            KeyMaterial::Master(b) => b,
            KeyMaterial::Arbitrary(b) => b,
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum OutputLength {
    Zero,
    One,
    Hash,
    Okm,
    Max,
    OverMax,
    Arbitrary(u16),
}

impl OutputLength {
    fn value(&self) -> usize {
        match self {
            OutputLength::Zero => 0,
            OutputLength::One => 1,
            OutputLength::Hash => 32,
            OutputLength::Okm => OKM_LEN,
            OutputLength::Max => MAX_OUTPUT_LEN,
            OutputLength::OverMax => MAX_OUTPUT_LEN + 1,
            OutputLength::Arbitrary(n) => *n as usize,
        }
    }
}

fuzz_target!(|scenario: DerivationScenario| {
    let ikm = scenario.ikm.as_bytes();
    let length = scenario.length.value();

    let first = derive_with_info(ikm, &scenario.salt, &scenario.info, length);
    let second = derive_with_info(ikm, &scenario.salt, &scenario.info, length);

    let should_accept =
        !ikm.is_empty() && !scenario.salt.is_empty() && length > 0 && length <= MAX_OUTPUT_LEN;
    assert_eq!(first.is_ok(), should_accept, "validation disagrees for {scenario:?}");

    match (&first, &second) {
        (Ok(a), Ok(b)) => {
            assert_eq!(a.len(), length);
            assert_eq!(a.expose(), b.expose(), "derivation must be deterministic");
        }
        (Err(a), Err(b)) => assert_eq!(a, b),
        _ => panic!("same inputs gave different outcomes"),
    }

    let mut out = vec![scenario.garbage; length];
    match derive_into(ikm, &scenario.salt, &scenario.info, &mut out) {
        Ok(()) => {
            if let Ok(expected) = &first {
                assert_eq!(out.as_slice(), expected.expose());
            }
        }
        Err(_) => assert!(
            out.iter().all(|&b| b == scenario.garbage),
            "rejected request touched the output buffer"
        ),
    }

    if let Ok(a) = &first {
        let mut other_salt = scenario.salt.clone();
        other_salt.push(0x5A);
        if let Ok(b) = derive_with_info(ikm, &other_salt, &scenario.info, length) {
            if length >= 16 {
                assert_ne!(a.expose(), b.expose(), "salt must affect the output");
            }
        }
    }
});
