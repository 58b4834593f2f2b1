//! Clipboard sync between devices through a shared token.
//!
//! The record stored under the token is
//! `{"content", "length", "timestamp", "device"}`. Change detection in
//! monitor mode compares SHA-256 digests of the content.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::client::{KvClient, StoreOptions, Transport};
use crate::errors::{KvError, Result};

/// Characters shown in previews before truncation.
pub const PREVIEW_CHARS: usize = 100;

/// Access to a text clipboard.
pub trait Clipboard {
    fn get_text(&mut self) -> Result<String>;
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The OS clipboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| KvError::ClipboardError(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl Clipboard for SystemClipboard {
    fn get_text(&mut self) -> Result<String> {
        match self.inner.get_text() {
            Ok(text) => Ok(text),
            // Images or an empty clipboard are treated as "no text".
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(KvError::ClipboardError(e.to_string())),
        }
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .set_text(text.to_owned())
            .map_err(|e| KvError::ClipboardError(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardRecord {
    pub content: String,
    pub length: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "unknown_device")]
    pub device: String,
}

fn unknown_device() -> String {
    "unknown".to_string()
}

impl ClipboardRecord {
    pub fn new(content: String) -> Self {
        Self {
            length: content.chars().count(),
            content,
            timestamp: Utc::now(),
            device: device_name(),
        }
    }

    pub fn preview(&self) -> String {
        preview(&self.content)
    }

    pub fn hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// `host (os)`, from the usual hostname environment variables.
pub fn device_name() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(unknown_device);
    format!("{host} ({})", std::env::consts::OS)
}

pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

/// Upload the local clipboard. `None` when it holds no text.
pub fn push<T: Transport>(
    client: &KvClient<T>,
    clipboard: &mut dyn Clipboard,
) -> Result<Option<ClipboardRecord>> {
    let content = clipboard.get_text()?;
    if content.is_empty() {
        return Ok(None);
    }

    let record = ClipboardRecord::new(content);
    client.store(&serde_json::to_value(&record)?, &StoreOptions::default())?;
    Ok(Some(record))
}

/// Read the cloud clipboard. `None` when nothing usable is stored.
pub fn fetch<T: Transport>(client: &KvClient<T>) -> Result<Option<ClipboardRecord>> {
    let data = match client.retrieve(None) {
        Ok(resp) => resp.data,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_value::<ClipboardRecord>(data) {
        Ok(record) if !record.content.is_empty() => Ok(Some(record)),
        Ok(_) => Ok(None),
        Err(e) => {
            debug!("stored data is not a clipboard record: {e}");
            Ok(None)
        }
    }
}

/// Copy the cloud clipboard into the local one.
pub fn pull<T: Transport>(
    client: &KvClient<T>,
    clipboard: &mut dyn Clipboard,
) -> Result<Option<ClipboardRecord>> {
    let record = fetch(client)?;
    if let Some(record) = &record {
        clipboard.set_text(&record.content)?;
    }
    Ok(record)
}

/// Change tracking for monitor loops.
#[derive(Debug, Default)]
pub struct ClipboardMonitor {
    last_hash: Option<String>,
}

impl ClipboardMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the local clipboard if it changed since the last push.
    pub fn poll_push<T: Transport>(
        &mut self,
        client: &KvClient<T>,
        clipboard: &mut dyn Clipboard,
    ) -> Result<Option<ClipboardRecord>> {
        let content = clipboard.get_text()?;
        if content.is_empty() {
            return Ok(None);
        }
        let hash = content_hash(&content);
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            return Ok(None);
        }

        let record = ClipboardRecord::new(content);
        client.store(&serde_json::to_value(&record)?, &StoreOptions::default())?;
        self.last_hash = Some(hash);
        Ok(Some(record))
    }

    /// Pull the cloud clipboard if it changed and differs from the local one.
    pub fn poll_pull<T: Transport>(
        &mut self,
        client: &KvClient<T>,
        clipboard: &mut dyn Clipboard,
    ) -> Result<Option<ClipboardRecord>> {
        let Some(record) = fetch(client)? else {
            return Ok(None);
        };
        let hash = record.hash();
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            return Ok(None);
        }

        let local = clipboard.get_text()?;
        self.last_hash = Some(hash.clone());
        if !local.is_empty() && content_hash(&local) == hash {
            return Ok(None);
        }

        clipboard.set_text(&record.content)?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryClipboard(String);

    impl Clipboard for MemoryClipboard {
        fn get_text(&mut self) -> Result<String> {
            Ok(self.0.clone())
        }

        fn set_text(&mut self, text: &str) -> Result<()> {
            self.0 = text.to_string();
            Ok(())
        }
    }

    #[test]
    fn preview_truncates_long_content() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(150);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = content_hash("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn record_counts_characters() {
        let record = ClipboardRecord::new("héllo".into());
        assert_eq!(record.length, 5);
        assert!(record.device.contains(std::env::consts::OS));
    }

    #[test]
    fn record_deserializes_without_device() {
        let record: ClipboardRecord = serde_json::from_value(serde_json::json!({
            "content": "x",
            "length": 1,
            "timestamp": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.device, "unknown");
    }

    #[test]
    fn memory_clipboard_roundtrip() {
        let mut clip = MemoryClipboard::default();
        clip.set_text("copied").unwrap();
        assert_eq!(clip.get_text().unwrap(), "copied");
    }
}
