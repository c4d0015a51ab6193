//! Job token issuance and validation.

use crate::claims::{JOB_TOKEN_ISSUER, JobTokenContext, JobTokenPayload};
use crate::clock::{Clock, SystemClock};
use crate::error::JobTokenError;
use crate::keys::{SigningKey, VerifyingKey};
use crate::schema::validate_claims;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};
use rcc_core::JobTokenConfig;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const SIGNING_ALGORITHM: Algorithm = Algorithm::ES256;
const SIGNING_ALGORITHM_NAME: &str = "ES256";

/// Issues signed job tokens.
#[derive(Clone)]
pub struct JobTokenIssuer {
    signing_key: SigningKey,
    clock: Arc<dyn Clock>,
}

impl JobTokenIssuer {
    /// Create a new issuer with the given signing key and the system clock.
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build an issuer from configuration, loading the private key once.
    ///
    /// Fails when the key is missing or malformed; callers should treat
    /// that as fatal at startup.
    pub fn from_config(config: &JobTokenConfig) -> Result<Self, JobTokenError> {
        let material = config.resolve_private_key()?.ok_or_else(|| {
            JobTokenError::MissingKey(format!(
                "no private key found (env: {}, file: {})",
                config.private_key_env.as_deref().unwrap_or("-"),
                config
                    .private_key_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ))
        })?;
        Ok(Self::new(SigningKey::from_key_material(&material)?))
    }

    /// Issue a token authorizing `job_id` to act for `user_id` (and
    /// optionally `org_id`) for `timeout_ms` plus the grace period.
    ///
    /// Identifiers are not checked here; an empty id yields a token the
    /// validator will refuse.
    pub fn create_job_token(
        &self,
        job_id: &str,
        user_id: &str,
        org_id: Option<&str>,
        timeout_ms: u64,
    ) -> Result<String, JobTokenError> {
        let payload = JobTokenPayload::new(job_id, user_id, org_id, timeout_ms, self.clock.now());
        let token = self.sign(&payload)?;

        tracing::debug!(
            job_id,
            exp = payload.exp,
            org_scoped = org_id.is_some(),
            "issued job token"
        );
        Ok(token)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, JobTokenError> {
        jsonwebtoken::encode(
            &Header::new(SIGNING_ALGORITHM),
            claims,
            self.signing_key.encoding_key(),
        )
        .map_err(|e| JobTokenError::TokenCreationFailed(e.to_string()))
    }
}

impl fmt::Debug for JobTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTokenIssuer").finish_non_exhaustive()
    }
}

/// Validates job tokens and projects them into a [`JobTokenContext`].
#[derive(Clone)]
pub struct JobTokenValidator {
    verifying_key: VerifyingKey,
    clock: Arc<dyn Clock>,
    clock_tolerance: i64,
    ignore_not_before: bool,
    signature_validation: Validation,
}

impl JobTokenValidator {
    /// Create a new validator with the given verifying key and the system clock.
    pub fn new(verifying_key: VerifyingKey) -> Self {
        // Only the signature is checked by jsonwebtoken; time, issuer and
        // schema checks run afterwards against our own clock.
        let mut signature_validation = Validation::new(SIGNING_ALGORITHM);
        signature_validation.validate_exp = false;
        signature_validation.validate_nbf = false;
        signature_validation.validate_aud = false;
        signature_validation.required_spec_claims.clear();

        Self {
            verifying_key,
            clock: Arc::new(SystemClock),
            clock_tolerance: 0,
            ignore_not_before: false,
            signature_validation,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Extra slack applied to both `exp` and `nbf`.
    pub fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance = i64::try_from(seconds).unwrap_or(i64::MAX);
        self
    }

    /// Skip the not-before check. Only available in test builds, for
    /// suites that validate stored fixtures against a frozen clock.
    #[cfg(any(test, feature = "test-util"))]
    pub fn ignoring_not_before(mut self) -> Self {
        self.ignore_not_before = true;
        self
    }

    /// Build a validator from configuration, loading the public key once.
    pub fn from_config(config: &JobTokenConfig) -> Result<Self, JobTokenError> {
        let material = config.resolve_public_key()?.ok_or_else(|| {
            JobTokenError::MissingKey(format!(
                "no public key found (env: {}, file: {})",
                config.public_key_env.as_deref().unwrap_or("-"),
                config
                    .public_key_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ))
        })?;
        Ok(Self::new(VerifyingKey::from_key_material(&material)?)
            .with_clock_tolerance(config.clock_tolerance_seconds))
    }

    /// Verify a bearer token and return its authorization context.
    ///
    /// Checks run in order (structure, signature, time, issuer, schema) and
    /// the first failing step decides the error.
    pub fn validate_job_token(&self, token: &str) -> Result<JobTokenContext, JobTokenError> {
        let result = self.validate(token);
        if let Err(e) = &result {
            tracing::debug!(kind = %e.kind(), error = %e, "rejected job token");
        }
        result
    }

    fn validate(&self, token: &str) -> Result<JobTokenContext, JobTokenError> {
        let token = token.trim();
        let decoded = decode_compact(token)?;

        if decoded.algorithm != SIGNING_ALGORITHM_NAME {
            return Err(JobTokenError::InvalidSignature);
        }
        self.verify_signature(token)?;

        self.check_time(&decoded.claims)?;
        check_issuer(&decoded.claims)?;

        let payload = validate_claims(&decoded.claims)
            .map_err(|violations| JobTokenError::InvalidTokenStructure { violations })?;
        Ok(payload.into())
    }

    fn verify_signature(&self, token: &str) -> Result<(), JobTokenError> {
        jsonwebtoken::decode::<Value>(
            token,
            self.verifying_key.decoding_key(),
            &self.signature_validation,
        )
        .map(|_| ())
        .map_err(|e| match e.kind() {
            JwtErrorKind::InvalidToken
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_) => JobTokenError::MalformedToken(e.to_string()),
            _ => JobTokenError::InvalidSignature,
        })
    }

    fn check_time(&self, claims: &Value) -> Result<(), JobTokenError> {
        let now = self.clock.now();

        // Missing or mistyped timestamps are reported by the schema check.
        if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
            if now > exp.saturating_add(self.clock_tolerance) {
                return Err(JobTokenError::TokenExpired { expired_at: exp });
            }
        }

        if !self.ignore_not_before {
            if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
                if now < nbf.saturating_sub(self.clock_tolerance) {
                    return Err(JobTokenError::TokenNotYetValid { not_before: nbf });
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for JobTokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTokenValidator")
            .field("clock_tolerance", &self.clock_tolerance)
            .field("ignore_not_before", &self.ignore_not_before)
            .finish_non_exhaustive()
    }
}

fn check_issuer(claims: &Value) -> Result<(), JobTokenError> {
    match claims.get("iss") {
        Some(Value::String(iss)) if iss == JOB_TOKEN_ISSUER => Ok(()),
        other => Err(JobTokenError::InvalidIssuer {
            expected: JOB_TOKEN_ISSUER.to_string(),
            actual: other.map(|v| match v {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            }),
        }),
    }
}

struct DecodedToken {
    header: Value,
    claims: Value,
    algorithm: String,
}

/// Split and decode a compact JWS without touching the signature.
fn decode_compact(token: &str) -> Result<DecodedToken, JobTokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(JobTokenError::MalformedToken(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        )));
    }

    let mut decoded = Vec::with_capacity(3);
    for (name, segment) in ["header", "payload", "signature"].iter().zip(&segments) {
        if segment.is_empty() {
            return Err(JobTokenError::MalformedToken(format!("{name} segment is empty")));
        }
        let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
            JobTokenError::MalformedToken(format!("{name} segment is not base64url: {e}"))
        })?;
        decoded.push(bytes);
    }

    let header: Value = serde_json::from_slice(&decoded[0])
        .map_err(|e| JobTokenError::MalformedToken(format!("header is not JSON: {e}")))?;
    let algorithm = header
        .get("alg")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| JobTokenError::MalformedToken("header has no \"alg\"".to_string()))?;

    let claims: Value = serde_json::from_slice(&decoded[1])
        .map_err(|e| JobTokenError::MalformedToken(format!("payload is not JSON: {e}")))?;
    if !claims.is_object() {
        return Err(JobTokenError::MalformedToken(
            "payload is not a JSON object".to_string(),
        ));
    }

    Ok(DecodedToken {
        header,
        claims,
        algorithm,
    })
}

/// Inspect a token without verification (for debugging).
///
/// Nothing returned here is trustworthy; never authorize on it.
pub fn inspect_token_unverified(token: &str) -> Result<TokenInfo, JobTokenError> {
    let decoded = decode_compact(token.trim())?;
    let expires_at = decoded.claims.get("exp").and_then(Value::as_i64);
    let payload = validate_claims(&decoded.claims).ok();

    Ok(TokenInfo {
        algorithm: decoded.algorithm,
        header: decoded.header,
        claims: decoded.claims,
        expires_at,
        payload,
    })
}

/// Information about a token (for inspection).
#[derive(Debug, Clone)]
pub struct TokenInfo {
    /// Declared signing algorithm.
    pub algorithm: String,
    /// Decoded JOSE header.
    pub header: Value,
    /// Decoded claim set, as sent.
    pub claims: Value,
    pub expires_at: Option<i64>,
    /// Typed payload, when the claims match the schema.
    pub payload: Option<JobTokenPayload>,
}
