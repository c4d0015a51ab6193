//! Error types for the job token crate.

use std::fmt;
use thiserror::Error;

/// A single schema violation found in a verified claim set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path of the offending field (e.g. `r.u`).
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_issuer(actual: &Option<String>) -> String {
    match actual {
        Some(actual) => format!("\"{actual}\""),
        None => "none".to_string(),
    }
}

/// Errors that can occur while issuing or validating job tokens.
#[derive(Debug, Error)]
pub enum JobTokenError {
    /// Token is not a parseable compact JWS.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature does not verify against the configured public key.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Current time is past `exp` (plus tolerance).
    #[error("token expired at {expired_at}")]
    TokenExpired { expired_at: i64 },

    /// Current time is before `nbf` (minus tolerance).
    #[error("token not valid before {not_before}")]
    TokenNotYetValid { not_before: i64 },

    /// `iss` does not match the expected issuer.
    #[error("invalid issuer: expected \"{expected}\", got {}", describe_issuer(.actual))]
    InvalidIssuer {
        expected: String,
        actual: Option<String>,
    },

    /// Claim set verified but failed schema validation.
    #[error("invalid token structure: {}", join_violations(.violations))]
    InvalidTokenStructure { violations: Vec<FieldViolation> },

    /// No key material was configured.
    #[error("missing key material: {0}")]
    MissingKey(String),

    /// Failed to parse private key.
    #[error("failed to parse private key: {0}")]
    InvalidPrivateKey(String),

    /// Failed to parse public key.
    #[error("failed to parse public key: {0}")]
    InvalidPublicKey(String),

    /// Failed to generate keypair.
    #[error("failed to generate keypair: {0}")]
    KeyGenerationFailed(String),

    /// Failed to sign a token.
    #[error("failed to create token: {0}")]
    TokenCreationFailed(String),

    /// IO error (reading/writing keys).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Stable classification of [`JobTokenError`] for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedToken,
    InvalidSignature,
    TokenExpired,
    TokenNotYetValid,
    InvalidIssuer,
    InvalidTokenStructure,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedToken => "malformed_token",
            ErrorKind::InvalidSignature => "invalid_signature",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::TokenNotYetValid => "token_not_yet_valid",
            ErrorKind::InvalidIssuer => "invalid_issuer",
            ErrorKind::InvalidTokenStructure => "invalid_token_structure",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JobTokenError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobTokenError::MalformedToken(_) => ErrorKind::MalformedToken,
            JobTokenError::InvalidSignature => ErrorKind::InvalidSignature,
            JobTokenError::TokenExpired { .. } => ErrorKind::TokenExpired,
            JobTokenError::TokenNotYetValid { .. } => ErrorKind::TokenNotYetValid,
            JobTokenError::InvalidIssuer { .. } => ErrorKind::InvalidIssuer,
            JobTokenError::InvalidTokenStructure { .. } => ErrorKind::InvalidTokenStructure,
            JobTokenError::MissingKey(_)
            | JobTokenError::InvalidPrivateKey(_)
            | JobTokenError::InvalidPublicKey(_)
            | JobTokenError::KeyGenerationFailed(_)
            | JobTokenError::TokenCreationFailed(_)
            | JobTokenError::IoError(_) => ErrorKind::Configuration,
        }
    }

    /// Whether this error rejects a presented token (as opposed to a
    /// configuration problem on our side). Rejections map to "unauthorized".
    pub fn is_rejection(&self) -> bool {
        self.kind() != ErrorKind::Configuration
    }
}
