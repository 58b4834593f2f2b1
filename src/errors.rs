use serde_json::Value;
use thiserror::Error;

/// All errors that can occur in the Key-Value client and CLI.
#[derive(Debug, Error)]
pub enum KvError {
    // --- Pre-flight errors (no request is sent) ---
    #[error("Token is required for {operation} operation")]
    MissingToken { operation: &'static str },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- Service errors, one per status class ---
    #[error("Validation failed: {message}")]
    Validation { message: String, errors: Vec<Value> },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Version conflict: {message}")]
    Conflict { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    // --- Transport errors ---
    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    InvalidResponse(String),

    // --- Caller-side retry ---
    #[error("Update still conflicting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong password or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Stored data is not an encrypted envelope")]
    NotEncrypted,

    #[error("This secret requires a password")]
    PasswordRequired,

    // --- Keyring errors ---
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Clipboard errors ---
    #[error("Clipboard error: {0}")]
    ClipboardError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

}

impl KvError {
    /// HTTP status carried by service errors, `None` for local failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            KvError::Validation { .. } => Some(400),
            KvError::NotFound { .. } => Some(404),
            KvError::Conflict { .. } => Some(409),
            KvError::RateLimited { .. } => Some(429),
            KvError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, KvError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound { .. })
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::SerializationError(e.to_string())
    }
}

/// Convenience type alias for Key-Value results.
pub type Result<T> = std::result::Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_service_variants() {
        let conflict = KvError::Conflict {
            message: "stale".into(),
        };
        assert_eq!(conflict.status(), Some(409));
        assert!(conflict.is_conflict());

        let api = KvError::Api {
            status: 503,
            message: "down".into(),
            body: String::new(),
        };
        assert_eq!(api.status(), Some(503));
        assert!(!api.is_not_found());
    }

    #[test]
    fn local_errors_have_no_status() {
        let err = KvError::MissingToken { operation: "store" };
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "Token is required for store operation");
        assert_eq!(KvError::Timeout { seconds: 30 }.status(), None);
    }
}
