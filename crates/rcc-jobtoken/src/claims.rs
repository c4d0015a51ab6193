//! Claims carried by job tokens.
//!
//! Field names on the wire are deliberately short to keep tokens small
//! enough to pass through environment variables and CLI arguments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Issuer identifier stamped into every job token.
pub const JOB_TOKEN_ISSUER: &str = "rcc";

/// Current payload schema version.
pub const JOB_TOKEN_VERSION: u32 = 1;

/// Added to `exp` so a token does not expire before a slow worker starts.
pub const GRACE_PERIOD_SECONDS: i64 = 5 * 60;

/// `nbf` is back-dated by this much to absorb issuer/validator clock drift.
pub const CLOCK_SKEW_GRACE_SECONDS: i64 = 30;

/// Token type tag (`r.t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// Background worker acting for a user or organization.
    #[serde(rename = "cj")]
    CloudJob,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::CloudJob => "cj",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rights embedded in the token (`r`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTokenRights {
    /// User the job runs on behalf of.
    pub u: String,

    /// Organization scope. Omitted entirely for personal jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<String>,

    /// Token type tag.
    pub t: TokenType,
}

/// The signed claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTokenPayload {
    pub iss: String,
    /// Job identifier.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    /// Schema version.
    pub v: u32,
    pub r: JobTokenRights,
}

/// Where a token sits in its lifetime at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NotYetValid,
    Valid,
    /// Terminal.
    Expired,
}

impl JobTokenPayload {
    /// Build the claim set for a job dispatched at `now` with a time budget
    /// of `timeout_ms` milliseconds.
    pub fn new(
        job_id: impl Into<String>,
        user_id: impl Into<String>,
        org_id: Option<&str>,
        timeout_ms: u64,
        now: i64,
    ) -> Self {
        let timeout_secs = i64::try_from(timeout_ms / 1000).unwrap_or(i64::MAX);
        Self {
            iss: JOB_TOKEN_ISSUER.to_string(),
            sub: job_id.into(),
            exp: now
                .saturating_add(timeout_secs)
                .saturating_add(GRACE_PERIOD_SECONDS),
            iat: now,
            nbf: now.saturating_sub(CLOCK_SKEW_GRACE_SECONDS),
            v: JOB_TOKEN_VERSION,
            r: JobTokenRights {
                u: user_id.into(),
                o: org_id.map(str::to_string),
                t: TokenType::CloudJob,
            },
        }
    }

    /// Total lifetime in seconds (`exp - iat`).
    pub fn lifetime_seconds(&self) -> i64 {
        self.exp - self.iat
    }

    /// Lifecycle state at `now`, without any tolerance.
    pub fn state_at(&self, now: i64) -> TokenState {
        if now < self.nbf {
            TokenState::NotYetValid
        } else if now > self.exp {
            TokenState::Expired
        } else {
            TokenState::Valid
        }
    }
}

/// The validated, flattened view handed to authorization checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTokenContext {
    pub job_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub token_type: TokenType,
    pub version: u32,
}

impl JobTokenContext {
    /// Whether the job is scoped to an organization.
    pub fn is_org_scoped(&self) -> bool {
        self.org_id.is_some()
    }
}

impl From<JobTokenPayload> for JobTokenContext {
    fn from(payload: JobTokenPayload) -> Self {
        Self {
            job_id: payload.sub,
            user_id: payload.r.u,
            org_id: payload.r.o,
            token_type: payload.r.t,
            version: payload.v,
        }
    }
}
