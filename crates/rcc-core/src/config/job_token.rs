//! Job token key and validation configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default environment variable holding the base64-encoded private key PEM.
pub const DEFAULT_PRIVATE_KEY_ENV: &str = "RCC_JOB_TOKEN_PRIVATE_KEY";

/// Default environment variable holding the base64-encoded public key PEM.
pub const DEFAULT_PUBLIC_KEY_ENV: &str = "RCC_JOB_TOKEN_PUBLIC_KEY";

/// Configuration for job token signing and validation.
///
/// There is deliberately no switch for skipping not-before checks here;
/// that bypass only exists in test builds of the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTokenConfig {
    /// Environment variable containing the private key (base64-encoded PEM).
    #[serde(default = "default_private_key_env")]
    pub private_key_env: Option<String>,

    /// Path to the private key file (PEM or base64-encoded PEM).
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Environment variable containing the public key (base64-encoded PEM).
    #[serde(default = "default_public_key_env")]
    pub public_key_env: Option<String>,

    /// Path to the public key file (PEM or base64-encoded PEM).
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,

    /// Extra slack in seconds applied to both `exp` and `nbf` checks.
    #[serde(default)]
    pub clock_tolerance_seconds: u64,
}

impl Default for JobTokenConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
            private_key_file: None,
            public_key_env: default_public_key_env(),
            public_key_file: None,
            clock_tolerance_seconds: 0,
        }
    }
}

impl JobTokenConfig {
    /// Resolve the private key from environment or file.
    pub fn resolve_private_key(&self) -> Result<Option<String>, std::io::Error> {
        resolve(self.private_key_env.as_deref(), self.private_key_file.as_ref())
    }

    /// Resolve the public key from environment or file.
    pub fn resolve_public_key(&self) -> Result<Option<String>, std::io::Error> {
        resolve(self.public_key_env.as_deref(), self.public_key_file.as_ref())
    }
}

fn resolve(env_var: Option<&str>, path: Option<&PathBuf>) -> Result<Option<String>, std::io::Error> {
    // Try environment variable first
    if let Some(env_var) = env_var {
        if let Ok(key) = std::env::var(env_var) {
            if !key.trim().is_empty() {
                return Ok(Some(key.trim().to_string()));
            }
        }
    }

    // Try file path
    if let Some(path) = path {
        if path.exists() {
            let key = std::fs::read_to_string(path)?;
            return Ok(Some(key.trim().to_string()));
        }
    }

    Ok(None)
}

fn default_private_key_env() -> Option<String> {
    Some(DEFAULT_PRIVATE_KEY_ENV.to_string())
}

fn default_public_key_env() -> Option<String> {
    Some(DEFAULT_PUBLIC_KEY_ENV.to_string())
}
