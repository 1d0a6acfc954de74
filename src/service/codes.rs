//! Unique voucher code generation.

use rand::Rng;

use crate::error::{Error, Result};
use crate::store::CodeIndex;

/// Collision retries before giving up. The random suffix gives a million
/// candidates per seed, so hitting this bound means the store is returning
/// garbage or the seed space is exhausted; either way we fail loudly instead
/// of spinning.
const MAX_ATTEMPTS: u32 = 16;

/// Produces a code of the form `WELCOME-<SEED>-<6 digits>` that no stored
/// voucher currently uses. The seed is uppercased with whitespace removed.
pub async fn generate_unique_code<I>(index: &I, seed: &str) -> Result<String>
where
    I: CodeIndex + ?Sized,
{
    let seed: String = seed
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    for _ in 0..MAX_ATTEMPTS {
        let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        let code = format!("WELCOME-{seed}-{suffix}");
        if !index.code_taken(&code).await? {
            return Ok(code);
        }
        tracing::debug!(%code, "voucher code collision, regenerating");
    }
    Err(Error::CodeGeneration)
}
