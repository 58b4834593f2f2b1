//! One module per `kv` subcommand.

pub mod auth;
pub mod batch;
pub mod cleanup;
pub mod clipboard;
pub mod completions;
pub mod delete;
pub mod encrypt;
pub mod generate;
pub mod get;
pub mod history;
pub mod ip;
pub mod lifecycle;
pub mod patch;
pub mod patch_demo;
pub mod secret;
pub mod signal;
pub mod store;
