//! Configuration types for RCC job tokens.
//!
//! Configuration is loaded from a single YAML file (usually `rcc.yaml`).
//! Every section is optional; an empty file yields a configuration that
//! reads key material from the default environment variables.
//!
//! # Example
//!
//! ```yaml
//! job_token:
//!   private_key_env: RCC_JOB_TOKEN_PRIVATE_KEY
//!   public_key_file: keys/job_token_public.pem
//!   clock_tolerance_seconds: 5
//! logging:
//!   level: debug
//! ```

pub mod job_token;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use job_token::JobTokenConfig;

/// Complete RCC configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RccConfig {
    /// Job token key and validation settings.
    #[serde(default)]
    pub job_token: JobTokenConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RccConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve key file paths relative to the
    /// directory containing the configuration file.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let job_token = &mut config.job_token;
        job_token.private_key_file = job_token
            .private_key_file
            .take()
            .map(|p| relative_to(&base_dir, p));
        job_token.public_key_file = job_token
            .public_key_file
            .take()
            .map(|p| relative_to(&base_dir, p));

        if job_token.private_key_env.is_none()
            && job_token.private_key_file.is_none()
            && job_token.public_key_env.is_none()
            && job_token.public_key_file.is_none()
        {
            return Err(ConfigError::Config(
                "job_token must name at least one key source (env or file)".to_string(),
            ));
        }

        Ok(config)
    }
}

// Serializes unit tests that read or write process environment variables
// (tempfile reads TMPDIR).
#[cfg(test)]
pub(crate) fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn relative_to(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
