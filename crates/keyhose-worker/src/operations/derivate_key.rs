//! `derivate_key`: HKDF over caller-supplied inputs.

use keyhose_crypto::{DerivationError, HkdfHash, derive_with_hash};
use keyhose_proto::{DerivateKeyRequest, DerivateKeyResponse};

use crate::{
    job_error::JobError,
    operation::{Job, Operation},
};

/// Registered name.
pub const DERIVATE_KEY: &str = "derivate_key";

/// The `derivate_key` operation.
///
/// Job data must be a CBOR [`DerivateKeyRequest`]; output is a CBOR
/// [`DerivateKeyResponse`]. The request names the HKDF hash. An unknown name
/// is an invalid job, not a derivation failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivateKey;

impl Operation for DerivateKey {
    fn execute(&self, job: &Job) -> Result<Vec<u8>, JobError> {
        let request = DerivateKeyRequest::decode(&job.data)
            .map_err(|e| JobError::InvalidJob(e.to_string()))?;
        let hash: HkdfHash = request
            .hash
            .parse()
            .map_err(|e: DerivationError| JobError::InvalidJob(e.to_string()))?;
        let length = usize::try_from(request.length)
            .map_err(|_| JobError::InvalidJob(format!("length {} out of range", request.length)))?;

        let okm = derive_with_hash(hash, &request.ikm, &request.salt, &request.info, length)?;

        Ok(DerivateKeyResponse::encode_okm(okm.expose())?)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use keyhose_proto::DEFAULT_HASH;

    use super::*;

    fn job(request: &DerivateKeyRequest) -> Job {
        Job { id: 1, data: Bytes::from(request.encode().unwrap()) }
    }

    fn rfc5869_case_one() -> DerivateKeyRequest {
        DerivateKeyRequest {
            ikm: Bytes::from(vec![0x0b; 22]),
            salt: Bytes::from((0x00..=0x0c).collect::<Vec<u8>>()),
            info: Bytes::from((0xf0..=0xf9).collect::<Vec<u8>>()),
            length: 42,
            hash: DEFAULT_HASH.to_string(),
        }
    }

    fn okm(output: &[u8]) -> Bytes {
        DerivateKeyResponse::decode(output).unwrap().okm
    }

    #[test]
    fn sha256_matches_rfc5869_case_one() {
        let output = DerivateKey.execute(&job(&rfc5869_case_one())).unwrap();

        assert_eq!(
            hex::encode(okm(&output)),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf\
             34007208d5b887185865"
        );
    }

    #[test]
    fn sha512_is_selectable() {
        let request = DerivateKeyRequest { hash: "sha512".to_string(), ..rfc5869_case_one() };
        let output = DerivateKey.execute(&job(&request)).unwrap();

        let expected = derive_with_hash(
            HkdfHash::Sha512,
            &request.ikm,
            &request.salt,
            &request.info,
            42,
        )
        .unwrap();
        assert_eq!(&okm(&output)[..], expected.expose());

        let sha256 = DerivateKey.execute(&job(&rfc5869_case_one())).unwrap();
        assert_ne!(okm(&output), okm(&sha256));
    }

    #[test]
    fn sha512_allows_longer_output() {
        let request =
            DerivateKeyRequest { hash: "sha512".to_string(), length: 8161, ..rfc5869_case_one() };

        let output = DerivateKey.execute(&job(&request)).unwrap();
        assert_eq!(okm(&output).len(), 8161);
    }

    #[test]
    fn unknown_hash_is_invalid_job() {
        let request = DerivateKeyRequest { hash: "md5".to_string(), ..rfc5869_case_one() };

        let result = DerivateKey.execute(&job(&request));
        assert!(
            matches!(&result, Err(JobError::InvalidJob(msg)) if msg.contains("md5")),
            "{result:?}"
        );
    }

    #[test]
    fn garbage_input_is_invalid_job() {
        let result = DerivateKey.execute(&Job { id: 1, data: Bytes::from_static(b"\xff\x00") });
        assert!(matches!(result, Err(JobError::InvalidJob(_))));
    }

    #[test]
    fn empty_salt_is_a_derivation_error() {
        let request = DerivateKeyRequest { salt: Bytes::new(), ..rfc5869_case_one() };

        let result = DerivateKey.execute(&job(&request));
        assert_eq!(result, Err(JobError::Derivation(DerivationError::InvalidSalt)));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let request = DerivateKeyRequest { length: 8161, ..rfc5869_case_one() };

        let result = DerivateKey.execute(&job(&request));
        assert!(matches!(
            result,
            Err(JobError::Derivation(DerivationError::OutputLengthExceeded { requested: 8161, .. }))
        ));
    }
}
