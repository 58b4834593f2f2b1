//! Password-sealed JSON envelopes.
//!
//! The service only ever sees the envelope; the plaintext JSON is
//! encrypted client-side with a key derived from a password.
//!
//! ```json
//! {
//!   "encrypted": true,
//!   "algorithm": "aes-256-gcm",
//!   "kdf": {"name": "argon2id", "m": 19456, "t": 2, "p": 1},
//!   "salt": "<base64>",
//!   "payload": "<base64 nonce||ciphertext>"
//! }
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::encryption::{decrypt, encrypt};
use super::kdf::{derive_key, generate_salt, Argon2Params};
use crate::errors::{KvError, Result};

const ALGORITHM: &str = "aes-256-gcm";
const KDF_NAME: &str = "argon2id";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KdfSpec {
    name: String,
    #[serde(flatten)]
    params: Argon2Params,
}

/// Wire form of an encrypted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    encrypted: bool,
    algorithm: String,
    kdf: KdfSpec,
    salt: String,
    payload: String,
}

/// Raw bytes sealed under a password: salt and nonce||ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub salt: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under a key derived from `password` and a fresh salt.
pub fn seal_bytes(plaintext: &[u8], password: &[u8], params: &Argon2Params) -> Result<Sealed> {
    let salt = generate_salt();
    let key = derive_key(password, &salt, params)?;
    let ciphertext = encrypt(key.as_slice(), plaintext)?;
    Ok(Sealed {
        salt: salt.to_vec(),
        ciphertext,
    })
}

/// Reverse of `seal_bytes`.
pub fn open_bytes(sealed: &Sealed, password: &[u8], params: &Argon2Params) -> Result<Vec<u8>> {
    let key = derive_key(password, &sealed.salt, params)?;
    decrypt(key.as_slice(), &sealed.ciphertext)
}

/// Encrypt a JSON value into an envelope value ready to be stored.
pub fn seal(value: &Value, password: &[u8], params: &Argon2Params) -> Result<Value> {
    let plaintext = serde_json::to_vec(value)?;
    let sealed = seal_bytes(&plaintext, password, params)?;

    let envelope = Envelope {
        encrypted: true,
        algorithm: ALGORITHM.to_string(),
        kdf: KdfSpec {
            name: KDF_NAME.to_string(),
            params: *params,
        },
        salt: BASE64.encode(&sealed.salt),
        payload: BASE64.encode(&sealed.ciphertext),
    };
    Ok(serde_json::to_value(envelope)?)
}

/// Whether `value` looks like an envelope produced by `seal`.
pub fn is_envelope(value: &Value) -> bool {
    value.get("encrypted").and_then(Value::as_bool) == Some(true)
        && value.get("payload").is_some_and(Value::is_string)
}

/// Decrypt an envelope value back into the original JSON.
pub fn open(value: &Value, password: &[u8]) -> Result<Value> {
    if !is_envelope(value) {
        return Err(KvError::NotEncrypted);
    }

    let envelope: Envelope =
        serde_json::from_value(value.clone()).map_err(|_| KvError::NotEncrypted)?;
    if envelope.algorithm != ALGORITHM || envelope.kdf.name != KDF_NAME {
        return Err(KvError::CommandFailed(format!(
            "unsupported envelope: {} / {}",
            envelope.algorithm, envelope.kdf.name
        )));
    }

    let sealed = Sealed {
        salt: BASE64
            .decode(&envelope.salt)
            .map_err(|_| KvError::DecryptionFailed)?,
        ciphertext: BASE64
            .decode(&envelope.payload)
            .map_err(|_| KvError::DecryptionFailed)?,
    };
    let plaintext = open_bytes(&sealed, password, &envelope.kdf.params)?;
    serde_json::from_slice(&plaintext).map_err(|_| KvError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn seal_and_open() {
        let secret = json!({"api_key": "sk_live_1234567890abcdef", "nested": {"cvv": "123"}});
        let envelope = seal(&secret, b"correct horse", &fast()).unwrap();

        assert!(is_envelope(&envelope));
        assert_eq!(envelope["kdf"]["name"], "argon2id");
        assert_eq!(envelope["kdf"]["m"], 8_192);
        assert!(!envelope.to_string().contains("sk_live"));

        assert_eq!(open(&envelope, b"correct horse").unwrap(), secret);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let envelope = seal(&json!({"a": 1}), b"right", &fast()).unwrap();
        assert!(matches!(
            open(&envelope, b"wrong"),
            Err(KvError::DecryptionFailed)
        ));
    }

    #[test]
    fn inflated_kdf_cost_fails_before_hashing() {
        let sealed = seal(&json!({"a": 1}), b"right", &fast()).unwrap();

        for (field, cost) in [("t", 400u64), ("m", u64::from(u32::MAX))] {
            let mut tampered = sealed.clone();
            tampered["kdf"][field] = json!(cost);

            let started = std::time::Instant::now();
            let result = open(&tampered, b"right");
            assert!(matches!(result, Err(KvError::KeyDerivationFailed(_))));
            assert!(started.elapsed() < std::time::Duration::from_millis(500));
        }
    }

    #[test]
    fn plain_data_is_not_an_envelope() {
        let plain = json!({"temperature": 23.5});
        assert!(!is_envelope(&plain));
        assert!(matches!(open(&plain, b"pw"), Err(KvError::NotEncrypted)));
    }
}
