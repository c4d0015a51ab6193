//! # rcc-jobtoken
//!
//! Short-lived bearer tokens that let a background worker ("cloud job") act
//! on behalf of a user or organization without holding a human session.
//!
//! This crate provides functionality for:
//! - Generating P-256 keypairs and loading them from PEM or base64 PEM
//! - Issuing ES256-signed job tokens with a baked-in expiry
//! - Validating tokens into a typed [`JobTokenContext`]
//! - Inspecting tokens without verification (for debugging)
//!
//! ## Token lifetime
//!
//! | Claim | Value |
//! |-------|-------|
//! | `iat` | issue time |
//! | `nbf` | `iat - 30s` (clock skew between hosts) |
//! | `exp` | `iat + timeout + 5min` (worker start-up latency) |
//!
//! ## Validation order
//!
//! Structure, signature, time, issuer, schema. The first failing step
//! decides the [`JobTokenError`]; schema failures list every offending field.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rcc_jobtoken::{FixedClock, JobTokenIssuer, JobTokenValidator, KeyPair};
//!
//! let keypair = KeyPair::generate()?;
//! let clock = Arc::new(FixedClock::new(1_672_531_200));
//! let issuer = JobTokenIssuer::new(keypair.signing_key()?).with_clock(clock.clone());
//! let validator = JobTokenValidator::new(keypair.verifying_key()?).with_clock(clock);
//!
//! let token = issuer.create_job_token("job-123", "user-456", Some("org-789"), 1_800_000)?;
//! let context = validator.validate_job_token(&token)?;
//! assert_eq!(context.job_id, "job-123");
//! # Ok::<(), rcc_jobtoken::JobTokenError>(())
//! ```

pub mod claims;
pub mod clock;
pub mod error;
pub mod keys;
pub mod schema;
pub mod token;

pub use claims::{
    CLOCK_SKEW_GRACE_SECONDS, GRACE_PERIOD_SECONDS, JOB_TOKEN_ISSUER, JOB_TOKEN_VERSION,
    JobTokenContext, JobTokenPayload, JobTokenRights, TokenState, TokenType,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorKind, FieldViolation, JobTokenError};
pub use keys::{KeyPair, SigningKey, VerifyingKey, load_verifying_key_base64, load_verifying_key_file};
pub use token::{JobTokenIssuer, JobTokenValidator, TokenInfo, inspect_token_unverified};
