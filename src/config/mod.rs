//! Configuration: `.keyvalue.toml` plus environment and flag overrides.

pub mod settings;

pub use settings::Settings;
