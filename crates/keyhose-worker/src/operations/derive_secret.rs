//! `derive_secret`: one fresh secret per job.

use std::time::Duration;

use keyhose_crypto::{DerivationError, DerivedSecret, EntropySource, SecretDeriver};
use keyhose_proto::DerivationResponse;

use crate::{
    job_error::JobError,
    operation::{Job, Operation},
};

/// Registered name.
pub const DERIVE_SECRET: &str = "derive_secret";

/// Derive a fresh secret and serialize it with its salt.
///
/// `job_id` only tags log lines; it never reaches the derivation. The secret
/// is encoded straight from its zeroizing buffer, so the returned reply is
/// the only copy that outlives this call.
///
/// # Errors
///
/// - `JobError::Derivation` if salt generation or HKDF fails. No payload is
///   produced in that case.
/// - `JobError::Encoding` if the response cannot be serialized
pub fn derive_secret<E: EntropySource>(
    deriver: &SecretDeriver<E>,
    job_id: &str,
) -> Result<Vec<u8>, JobError> {
    let DerivedSecret { salt, secret } = deriver.derive_secret()?;
    let encoded = DerivationResponse::encode_parts(salt.as_bytes(), secret.expose())?;

    tracing::trace!(job_id, encoded_len = encoded.len(), "secret derived");
    Ok(encoded)
}

/// The `derive_secret` operation.
///
/// Job data is treated as an opaque identifier. HKDF itself never blocks, so
/// a job that overruns the pool timeout is stuck on the entropy read and is
/// reported as `entropy_unavailable`.
pub struct DeriveSecret<E> {
    deriver: SecretDeriver<E>,
}

impl<E: EntropySource> DeriveSecret<E> {
    /// Wrap a deriver.
    pub fn new(deriver: SecretDeriver<E>) -> Self {
        Self { deriver }
    }
}

impl<E: EntropySource + 'static> Operation for DeriveSecret<E> {
    fn execute(&self, job: &Job) -> Result<Vec<u8>, JobError> {
        let job_id = String::from_utf8_lossy(&job.data);
        derive_secret(&self.deriver, &job_id)
    }

    fn timeout_error(&self, elapsed: Duration) -> JobError {
        JobError::Derivation(DerivationError::EntropyUnavailable {
            reason: format!("entropy read did not return within {elapsed:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use keyhose_crypto::{DerivationParams, OKM_LEN, OsEntropy, SALT_LEN, derive, reference_master_key};

    use super::*;

    struct Dry;

    impl EntropySource for Dry {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), DerivationError> {
            Err(DerivationError::EntropyUnavailable { reason: "dry".to_string() })
        }
    }

    fn deriver<E: EntropySource>(entropy: E) -> SecretDeriver<E> {
        SecretDeriver::new(Arc::new(reference_master_key()), entropy, DerivationParams::default())
            .unwrap()
    }

    #[test]
    fn output_decodes_to_salt_and_secret() {
        let op = DeriveSecret::new(deriver(OsEntropy::new()));
        let output = op.execute(&Job { id: 7, data: Bytes::from_static(b"job-7") }).unwrap();

        let response = DerivationResponse::decode(&output).unwrap();
        assert_eq!(response.salt().len(), SALT_LEN);
        assert_eq!(response.secret().len(), OKM_LEN);
        assert!(response.secret().iter().any(|&b| b != 0));
    }

    #[test]
    fn secret_replays_from_salt() {
        let output = derive_secret(&deriver(OsEntropy::new()), "replay").unwrap();
        let response = DerivationResponse::decode(&output).unwrap();

        let replayed = derive(reference_master_key().expose(), response.salt(), OKM_LEN).unwrap();
        assert_eq!(replayed.expose(), response.secret());
    }

    #[test]
    fn entropy_failure_produces_no_payload() {
        let op = DeriveSecret::new(deriver(Dry));
        let result = op.execute(&Job { id: 1, data: Bytes::new() });

        assert!(matches!(
            result,
            Err(JobError::Derivation(DerivationError::EntropyUnavailable { .. }))
        ));
    }

    #[test]
    fn overrun_is_reported_as_entropy_unavailable() {
        let op = DeriveSecret::new(deriver(OsEntropy::new()));
        let err = op.timeout_error(Duration::from_millis(50));

        assert_eq!(err.error_type(), "entropy_unavailable");
        assert!(err.is_transient());
    }
}
