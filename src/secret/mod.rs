//! One-time secrets: values that can be revealed once, then disappear.
//!
//! A secret is stored as an ordinary record:
//!
//! ```json
//! {
//!   "secret": {"encrypted": "password", "salt": "..", "kdf": {..}, "content": ".."},
//!   "created_at": "2025-01-01T00:00:00Z",
//!   "one_time": true,
//!   "views": 0,
//!   "max_views": 1
//! }
//! ```
//!
//! Reading it bumps `views`; once `max_views` is reached the record is
//! overwritten with a `{"consumed": true}` placeholder.
//!
//! The view count is maintained with plain retrieve/store calls, not a
//! versioned patch, so two readers racing on the same token can both see
//! the secret before either marks it consumed.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{KvClient, StoreOptions, Transport};
use crate::crypto::{open_bytes, seal_bytes, Argon2Params, Sealed};
use crate::errors::{KvError, Result};

/// Encoded secret content as stored on the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "encrypted", rename_all = "lowercase")]
pub enum SecretContent {
    /// Base64 only; anyone holding the token can read it.
    None { content: String },
    /// AES-256-GCM under an Argon2id key derived from a password.
    Password {
        salt: String,
        kdf: Argon2Params,
        content: String,
    },
}

impl SecretContent {
    pub fn encode(plaintext: &str, password: Option<&str>, params: &Argon2Params) -> Result<Self> {
        match password {
            None => Ok(SecretContent::None {
                content: BASE64.encode(plaintext.as_bytes()),
            }),
            Some(password) => {
                let sealed = seal_bytes(plaintext.as_bytes(), password.as_bytes(), params)?;
                Ok(SecretContent::Password {
                    salt: BASE64.encode(&sealed.salt),
                    kdf: *params,
                    content: BASE64.encode(&sealed.ciphertext),
                })
            }
        }
    }

    pub fn decode(&self, password: Option<&str>) -> Result<String> {
        let bytes = match self {
            SecretContent::None { content } => BASE64
                .decode(content)
                .map_err(|e| KvError::SerializationError(format!("secret content: {e}")))?,
            SecretContent::Password { salt, kdf, content } => {
                let password = password.ok_or(KvError::PasswordRequired)?;
                let sealed = Sealed {
                    salt: BASE64.decode(salt).map_err(|_| KvError::DecryptionFailed)?,
                    ciphertext: BASE64.decode(content).map_err(|_| KvError::DecryptionFailed)?,
                };
                open_bytes(&sealed, password.as_bytes(), kdf)?
            }
        };
        String::from_utf8(bytes).map_err(|_| KvError::DecryptionFailed)
    }

    pub fn is_password_protected(&self) -> bool {
        matches!(self, SecretContent::Password { .. })
    }
}

/// The full record stored under a one-time secret token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub secret: SecretContent,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub one_time: bool,
    #[serde(default)]
    pub views: u32,
    #[serde(default = "default_max_views")]
    pub max_views: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_views() -> u32 {
    1
}

/// Returned by `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSecret {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub password_protected: bool,
}

/// A successfully revealed secret.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealedSecret {
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub views: u32,
    /// True when this read used up the last view.
    pub consumed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Revealed(RevealedSecret),
    /// No record under this token (never created, expired, or deleted).
    NotFound,
    /// The secret exists but has already been read.
    AlreadyRead,
}

/// Store a new one-time secret under `token`.
pub fn create<T: Transport>(
    client: &KvClient<T>,
    token: &str,
    secret: &str,
    password: Option<&str>,
    ttl: Option<u64>,
    params: &Argon2Params,
) -> Result<CreatedSecret> {
    let token = token.trim();
    if token.is_empty() {
        return Err(KvError::MissingToken {
            operation: "secret create",
        });
    }

    let record = SecretRecord {
        secret: SecretContent::encode(secret, password, params)?,
        created_at: Utc::now(),
        one_time: true,
        views: 0,
        max_views: 1,
    };

    let options = StoreOptions {
        token: Some(token.to_string()),
        ttl,
        schema: None,
    };
    client.store(&serde_json::to_value(&record)?, &options)?;

    Ok(CreatedSecret {
        token: token.to_string(),
        expires_at: ttl.and_then(|s| expiry(record.created_at, s)),
        password_protected: record.secret.is_password_protected(),
    })
}

/// `created_at + ttl`, or `None` when it does not fit in a timestamp.
fn expiry(created_at: DateTime<Utc>, ttl_secs: u64) -> Option<DateTime<Utc>> {
    let ttl = Duration::try_seconds(i64::try_from(ttl_secs).ok()?)?;
    created_at.checked_add_signed(ttl)
}

/// Reveal a one-time secret and record the view.
pub fn read<T: Transport>(
    client: &KvClient<T>,
    token: &str,
    password: Option<&str>,
) -> Result<ReadOutcome> {
    let data = match client.retrieve(Some(token)) {
        Ok(resp) => resp.data,
        Err(e) if e.is_not_found() => return Ok(ReadOutcome::NotFound),
        Err(e) => return Err(e),
    };

    if is_consumed_placeholder(&data) {
        return Ok(ReadOutcome::AlreadyRead);
    }

    let mut record: SecretRecord = serde_json::from_value(data)
        .map_err(|e| KvError::InvalidResponse(format!("not a one-time secret: {e}")))?;

    if record.views >= record.max_views {
        debug!("secret already at {} views, deleting", record.views);
        client.delete(Some(token))?;
        return Ok(ReadOutcome::AlreadyRead);
    }

    let secret = record.secret.decode(password)?;

    record.views += 1;
    let consumed = record.views >= record.max_views;
    let options = StoreOptions::with_token(token);
    if consumed {
        client.store(&consumed_placeholder(), &options)?;
    } else {
        client.store(&serde_json::to_value(&record)?, &options)?;
    }

    Ok(ReadOutcome::Revealed(RevealedSecret {
        secret,
        created_at: record.created_at,
        views: record.views,
        consumed,
    }))
}

fn consumed_placeholder() -> Value {
    json!({
        "consumed": true,
        "consumed_at": Utc::now(),
    })
}

fn is_consumed_placeholder(data: &Value) -> bool {
    data.get("consumed").and_then(Value::as_bool) == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn plain_content_roundtrip() {
        let content = SecretContent::encode("hunter2", None, &fast()).unwrap();
        assert!(!content.is_password_protected());
        assert_eq!(content.decode(None).unwrap(), "hunter2");

        let wire = serde_json::to_value(&content).unwrap();
        assert_eq!(wire["encrypted"], "none");
    }

    #[test]
    fn password_content_requires_password() {
        let content = SecretContent::encode("API Key: sk_123", Some("pw"), &fast()).unwrap();
        assert!(content.is_password_protected());
        assert!(matches!(content.decode(None), Err(KvError::PasswordRequired)));
        assert!(matches!(
            content.decode(Some("nope")),
            Err(KvError::DecryptionFailed)
        ));
        assert_eq!(content.decode(Some("pw")).unwrap(), "API Key: sk_123");
    }

    #[test]
    fn stored_kdf_cost_is_bounded() {
        let content = SecretContent::encode("API Key: sk_123", Some("pw"), &fast()).unwrap();
        let mut wire = serde_json::to_value(&content).unwrap();
        wire["kdf"]["t"] = json!(u32::MAX);

        let tampered: SecretContent = serde_json::from_value(wire).unwrap();
        assert!(matches!(
            tampered.decode(Some("pw")),
            Err(KvError::KeyDerivationFailed(_))
        ));
    }

    #[test]
    fn expiry_handles_huge_ttl() {
        let created: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(
            expiry(created, 3600),
            Some("2025-01-01T01:00:00Z".parse().unwrap())
        );
        assert_eq!(expiry(created, 10_000_000_000_000_000), None);
        assert_eq!(expiry(created, u64::MAX), None);
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_consumed_placeholder(&consumed_placeholder()));
        assert!(!is_consumed_placeholder(&json!({"views": 0})));
    }
}
