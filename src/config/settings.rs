use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::crypto::Argon2Params;
use crate::errors::{KvError, Result};

/// Project-level configuration, loaded from `.keyvalue.toml`.
///
/// Every field has a sensible default so `kv` works out-of-the-box
/// without any config file at all.  Environment variables and CLI flags
/// take precedence over the file (see `Settings::apply_overrides`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default token used when a command does not name one.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Argon2 memory cost in KiB for client-side encryption.
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count.
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree.
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_api_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_argon2_memory_kib() -> u32 {
    Argon2Params::default().memory_kib
}

fn default_argon2_iterations() -> u32 {
    Argon2Params::default().iterations
}

fn default_argon2_parallelism() -> u32 {
    Argon2Params::default().parallelism
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the working directory.
    pub const FILE_NAME: &'static str = ".keyvalue.toml";

    /// Load settings from `<dir>/.keyvalue.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            KvError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.timeout_secs == 0 {
            return Err(KvError::ConfigError(
                "timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(settings)
    }

    /// Layer command-line / environment values on top of the file.
    ///
    /// Blank values are ignored so an empty `KV_TOKEN=` does not wipe a
    /// token from the config file.
    pub fn apply_overrides(
        mut self,
        api_url: Option<&str>,
        token: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Self {
        if let Some(url) = api_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.api_url = url.to_string();
        }
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            self.token = Some(token.to_string());
        }
        if let Some(secs) = timeout_secs.filter(|s| *s > 0) {
            self.timeout_secs = secs;
        }
        self
    }

    /// Build the immutable client configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_url.clone(),
            token: self.token.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.api_url, "https://key-value.co");
        assert!(s.token.is_none());
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.argon2_params(), Argon2Params::default());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.api_url, "https://key-value.co");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
api_url = "http://localhost:8787"
token = "alpha-bravo-charlie-delta-echo"
timeout_secs = 5
argon2_memory_kib = 65536
"#;
        fs::write(tmp.path().join(".keyvalue.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.api_url, "http://localhost:8787");
        assert_eq!(
            settings.token.as_deref(),
            Some("alpha-bravo-charlie-delta-echo")
        );
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.argon2_memory_kib, 65_536);
        // Unset fields keep their defaults.
        assert_eq!(settings.argon2_iterations, 2);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".keyvalue.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".keyvalue.toml"), "timeout_secs = 0\n").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let s = Settings {
            token: Some("file-token".into()),
            ..Settings::default()
        }
        .apply_overrides(Some("http://kv.test/"), Some("flag-token"), Some(3));

        let config = s.client_config();
        assert_eq!(config.base_url, "http://kv.test/");
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let s = Settings {
            token: Some("file-token".into()),
            ..Settings::default()
        }
        .apply_overrides(Some(""), Some("  "), Some(0));

        assert_eq!(s.api_url, "https://key-value.co");
        assert_eq!(s.token.as_deref(), Some("file-token"));
        assert_eq!(s.timeout_secs, 30);
    }
}
