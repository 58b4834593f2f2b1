//! Client-side cryptography.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - Password-sealed JSON envelopes stored as record data (`envelope`)

pub mod encryption;
pub mod envelope;
pub mod kdf;

pub use encryption::{decrypt, encrypt};
pub use envelope::{is_envelope, open, open_bytes, seal, seal_bytes, Sealed};
pub use kdf::{derive_key, generate_salt, Argon2Params};
