//! Built-in operations.
//!
//! - `derive_secret`: fresh salt plus HKDF over the process master key
//! - `derivate_key`: HKDF over caller-supplied key material

mod derivate_key;
mod derive_secret;

pub use derivate_key::{DERIVATE_KEY, DerivateKey};
pub use derive_secret::{DERIVE_SECRET, DeriveSecret, derive_secret};
use keyhose_crypto::{EntropySource, SecretDeriver};

use crate::{error::WorkerError, operation::OperationTable};

/// Table with every built-in operation registered.
///
/// # Errors
///
/// Only fails if two built-ins share a name.
pub fn default_operations<E>(deriver: SecretDeriver<E>) -> Result<OperationTable, WorkerError>
where
    E: EntropySource + 'static,
{
    let params = deriver.params();
    tracing::info!(
        salt_len = params.salt_len,
        output_len = params.output_len,
        info_len = params.info.len(),
        "derive_secret parameters"
    );

    let mut table = OperationTable::new();
    table.register(DERIVE_SECRET, DeriveSecret::new(deriver))?;
    table.register(DERIVATE_KEY, DerivateKey)?;
    Ok(table)
}
