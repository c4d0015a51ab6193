//! Shared types for the RCC job token crates.
//!
//! Configuration lives here so that the issuing service, the validating
//! service and the CLI all read the same `rcc.yaml` layout.

pub mod config;

pub use config::{ConfigError, JobTokenConfig, LoggingConfig, RccConfig};
