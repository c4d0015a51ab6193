//! Token management commands.
//!
//! `rcc token issue` - Issue a job token.
//! `rcc token verify` - Verify a token and print its authorization context.
//! `rcc token inspect` - Inspect a token's contents without verification.

use anyhow::Context;
use rcc_core::JobTokenConfig;
use rcc_jobtoken::{
    JobTokenContext, JobTokenIssuer, JobTokenValidator, SigningKey, VerifyingKey,
    inspect_token_unverified,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Read key material from a file path, or take the argument as the material itself.
fn read_key_argument(key: &str) -> anyhow::Result<String> {
    let path = Path::new(key);
    if path.exists() {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()));
    }
    Ok(key.to_string())
}

/// Build an issuer from `--key` (path or base64 PEM), falling back to configuration.
fn resolve_issuer(key: Option<String>, config: &JobTokenConfig) -> anyhow::Result<JobTokenIssuer> {
    match key {
        Some(key) => {
            let material = read_key_argument(&key)?;
            let signing_key = SigningKey::from_key_material(&material)
                .context("Failed to parse private key. Expected a P-256 PKCS#8 PEM (optionally base64-encoded)")?;
            Ok(JobTokenIssuer::new(signing_key))
        }
        None => JobTokenIssuer::from_config(config).context(
            "Private key not available. Either pass --key <path|base64> or configure job_token.private_key_env / private_key_file",
        ),
    }
}

/// Build a validator from `--key` (path or base64 PEM), falling back to configuration.
fn resolve_validator(
    key: Option<String>,
    config: &JobTokenConfig,
    clock_tolerance: Option<u64>,
) -> anyhow::Result<JobTokenValidator> {
    let validator = match key {
        Some(key) => {
            let material = read_key_argument(&key)?;
            let verifying_key = VerifyingKey::from_key_material(&material)
                .context("Failed to parse public key. Expected a P-256 SPKI PEM (optionally base64-encoded)")?;
            JobTokenValidator::new(verifying_key).with_clock_tolerance(config.clock_tolerance_seconds)
        }
        None => JobTokenValidator::from_config(config).context(
            "Public key not available. Either pass --key <path|base64> or configure job_token.public_key_env / public_key_file",
        )?,
    };

    Ok(match clock_tolerance {
        Some(seconds) => validator.with_clock_tolerance(seconds),
        None => validator,
    })
}

/// Load a token from a file if the argument names one.
fn read_token_argument(token: String) -> anyhow::Result<String> {
    if Path::new(&token).exists() {
        Ok(fs::read_to_string(&token)?.trim().to_string())
    } else {
        Ok(token)
    }
}

/// Arguments for `rcc token issue`.
#[derive(Debug, Clone)]
pub struct IssueArgs {
    pub key: Option<String>,
    pub job_id: String,
    pub user_id: String,
    pub org_id: Option<String>,
    pub timeout_ms: u64,
    pub output: Option<PathBuf>,
}

/// Issue a job token.
pub fn issue(args: IssueArgs, config: &JobTokenConfig) -> anyhow::Result<()> {
    let issuer = resolve_issuer(args.key, config)?;
    let token = issuer.create_job_token(
        &args.job_id,
        &args.user_id,
        args.org_id.as_deref(),
        args.timeout_ms,
    )?;

    if let Some(output_path) = args.output {
        fs::write(&output_path, &token)?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  Job:  {}", args.job_id);
        println!("  User: {}", args.user_id);
        if let Some(org) = &args.org_id {
            println!("  Org:  {}", org);
        }
        println!("  Timeout: {} ms (+5 min grace)", args.timeout_ms);
    } else {
        println!("{}", token);
    }

    Ok(())
}

/// Verify a token and print its context as JSON.
pub fn verify(
    key: Option<String>,
    token: String,
    clock_tolerance: Option<u64>,
    config: &JobTokenConfig,
) -> anyhow::Result<JobTokenContext> {
    let validator = resolve_validator(key, config, clock_tolerance)?;
    let token = read_token_argument(token)?;

    match validator.validate_job_token(&token) {
        Ok(context) => {
            println!("{}", serde_json::to_string_pretty(&context)?);
            Ok(context)
        }
        Err(e) => {
            let kind = e.kind();
            Err(anyhow::Error::new(e).context(format!("✖ Token verification failed [{kind}]")))
        }
    }
}

/// Inspect a token without verification.
pub fn inspect(token: String) -> anyhow::Result<()> {
    let token = read_token_argument(token)?;
    let info = inspect_token_unverified(&token)?;

    println!("Token Information (UNVERIFIED):");
    println!("  Algorithm: {}", info.algorithm);
    if let Some(exp) = info.expires_at {
        match chrono::DateTime::from_timestamp(exp, 0) {
            Some(at) => println!("  Expires:   {} ({})", exp, at.to_rfc3339()),
            None => println!("  Expires:   {}", exp),
        }
    }
    println!(
        "  Schema:    {}",
        if info.payload.is_some() { "valid" } else { "INVALID" }
    );
    println!();
    println!("Header:");
    println!("{}", serde_json::to_string_pretty(&info.header)?);
    println!("Claims:");
    println!("{}", serde_json::to_string_pretty(&info.claims)?);

    Ok(())
}
