pub mod cli;
pub mod client;
pub mod clipboard;
pub mod concurrency;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod history;
pub mod ip;
pub mod secret;
pub mod signal;

#[cfg(feature = "keyring-store")]
pub mod keyring;

pub use client::{KvClient, Transport};
pub use errors::{KvError, Result};
