//! Password-based key derivation using Argon2id.
//!
//! Envelopes record the parameters they were sealed with, so a payload
//! written with one configuration can still be opened after the defaults
//! change.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{KvError, Result};

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Length of the derived key in bytes (256 bits, for AES-256).
const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Upper bounds for parameters read back from stored envelopes (1 GiB).
const MAX_MEMORY_KIB: u32 = 1_048_576;
const MAX_ITERATIONS: u32 = 10;
const MAX_PARALLELISM: u32 = 16;

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 19 456 = 19 MB).
    #[serde(rename = "m")]
    pub memory_kib: u32,
    /// Number of iterations (default: 2).
    #[serde(rename = "t")]
    pub iterations: u32,
    /// Parallelism lanes (default: 1).
    #[serde(rename = "p")]
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Derive a 32-byte key from a password and salt.
///
/// The same password + salt + params always produce the same key.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if argon2_params.memory_kib < MIN_MEMORY_KIB {
        return Err(KvError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            argon2_params.memory_kib
        )));
    }
    if argon2_params.iterations < 1 || argon2_params.parallelism < 1 {
        return Err(KvError::KeyDerivationFailed(
            "Argon2 iterations and parallelism must be at least 1".into(),
        ));
    }
    if argon2_params.memory_kib > MAX_MEMORY_KIB
        || argon2_params.iterations > MAX_ITERATIONS
        || argon2_params.parallelism > MAX_PARALLELISM
    {
        return Err(KvError::KeyDerivationFailed(format!(
            "Argon2 params out of range (m <= {MAX_MEMORY_KIB}, t <= {MAX_ITERATIONS}, p <= {MAX_PARALLELISM})"
        )));
    }

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| KvError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| KvError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
