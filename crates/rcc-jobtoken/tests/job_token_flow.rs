//! End-to-end tests for issuing and validating job tokens through the
//! public API, including configuration-driven key loading.
//!
//! Run with: cargo test --package rcc-jobtoken --test job_token_flow

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rcc_core::JobTokenConfig;
use rcc_jobtoken::{
    FixedClock, JobTokenContext, JobTokenError, JobTokenIssuer, JobTokenValidator, KeyPair,
    TokenType,
};
use std::sync::{Arc, Mutex, MutexGuard};

const NOW: i64 = 1_672_531_200;

// Serializes every test that reads or writes process environment variables.
// tempfile reads TMPDIR, so key-file tests take it as well.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn env_guard() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn pair(clock: Arc<FixedClock>) -> (JobTokenIssuer, JobTokenValidator) {
    let keypair = KeyPair::generate().unwrap();
    (
        JobTokenIssuer::new(keypair.signing_key().unwrap()).with_clock(clock.clone()),
        JobTokenValidator::new(keypair.verifying_key().unwrap()).with_clock(clock),
    )
}

fn payload_of(token: &str) -> serde_json::Value {
    let segment = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
}

/// The documented dispatch scenario: a 30 minute job for an organization.
#[test]
fn test_dispatch_scenario() {
    let clock = Arc::new(FixedClock::new(NOW));
    let (issuer, validator) = pair(clock);

    let token = issuer
        .create_job_token("job-123", "user-456", Some("org-789"), 1_800_000)
        .unwrap();

    let payload = payload_of(&token);
    assert_eq!(payload["iss"], "rcc");
    assert_eq!(payload["iat"], 1_672_531_200i64);
    assert_eq!(payload["exp"], 1_672_533_300i64);
    assert_eq!(payload["nbf"], 1_672_531_170i64);
    assert_eq!(payload["v"], 1);

    let context = validator.validate_job_token(&token).unwrap();
    assert_eq!(
        context,
        JobTokenContext {
            job_id: "job-123".to_string(),
            user_id: "user-456".to_string(),
            org_id: Some("org-789".to_string()),
            token_type: TokenType::CloudJob,
            version: 1,
        }
    );
}

/// Round-trip over a spread of inputs, checking the timing arithmetic each time.
#[test]
fn test_round_trip_inputs() {
    let clock = Arc::new(FixedClock::new(NOW));
    let (issuer, validator) = pair(clock);

    let cases: [(&str, &str, Option<&str>, u64); 5] = [
        ("j", "u", None, 0),
        ("job-with-org", "user", Some("org"), 999),
        ("job-long", "user", None, 86_400_000),
        ("ジョブ", "ユーザー", Some("組織"), 12_345),
        ("job/with.dots", "user@example.com", Some(""), 1_000),
    ];

    for (job_id, user_id, org_id, timeout_ms) in cases {
        let token = issuer.create_job_token(job_id, user_id, org_id, timeout_ms).unwrap();

        let payload = payload_of(&token);
        let exp = payload["exp"].as_i64().unwrap();
        let iat = payload["iat"].as_i64().unwrap();
        let nbf = payload["nbf"].as_i64().unwrap();
        assert_eq!(exp - iat, (timeout_ms / 1000) as i64 + 300);
        assert_eq!(iat - nbf, 30);
        assert_eq!(payload["r"].get("o").is_some(), org_id.is_some());

        let context = validator.validate_job_token(&token).unwrap();
        assert_eq!(context.job_id, job_id);
        assert_eq!(context.user_id, user_id);
        assert_eq!(context.org_id.as_deref(), org_id);
        assert_eq!(context.token_type, TokenType::CloudJob);
        assert_eq!(context.version, 1);
    }
}

#[test]
fn test_personal_job_context_omits_org() {
    let clock = Arc::new(FixedClock::new(NOW));
    let (issuer, validator) = pair(clock);

    let token = issuer.create_job_token("job", "user", None, 60_000).unwrap();
    let context = validator.validate_job_token(&token).unwrap();
    assert!(context.org_id.is_none());
    assert!(!context.is_org_scoped());

    let json = serde_json::to_value(&context).unwrap();
    assert!(json.get("orgId").is_none());
}

/// The token walks not-yet-valid -> valid -> expired purely by time.
#[test]
fn test_lifecycle_by_clock() {
    let clock = Arc::new(FixedClock::new(NOW));
    let (issuer, validator) = pair(clock.clone());
    let token = issuer.create_job_token("job", "user", None, 10_000).unwrap();

    clock.set(NOW - 31);
    assert!(matches!(
        validator.validate_job_token(&token),
        Err(JobTokenError::TokenNotYetValid { .. })
    ));

    clock.set(NOW);
    assert!(validator.validate_job_token(&token).is_ok());

    clock.advance(310);
    assert!(validator.validate_job_token(&token).is_ok());

    clock.advance(1);
    let err = validator.validate_job_token(&token).unwrap_err();
    assert!(matches!(err, JobTokenError::TokenExpired { .. }));
    assert!(err.is_rejection());
    assert_eq!(err.kind().as_str(), "token_expired");
}

/// Validators hold only immutable state and can be shared across threads.
#[test]
fn test_parallel_validation() {
    let clock = Arc::new(FixedClock::new(NOW));
    let (issuer, validator) = pair(clock);
    let validator = Arc::new(validator);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let token = issuer
                .create_job_token(&format!("job-{i}"), "user", None, 60_000)
                .unwrap();
            let validator = Arc::clone(&validator);
            std::thread::spawn(move || validator.validate_job_token(&token).unwrap().job_id)
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("job-{i}"));
    }
}

/// Keys are loaded once from base64-encoded PEM in environment variables.
#[test]
fn test_from_config_env_keys() {
    let _guard = env_guard();
    let keypair = KeyPair::generate().unwrap();

    // SAFETY: We're in a test and controlling the environment
    unsafe {
        std::env::set_var("RCC_FLOW_TEST_PRIVATE_KEY", keypair.private_key_base64().unwrap());
        std::env::set_var("RCC_FLOW_TEST_PUBLIC_KEY", keypair.public_key_base64().unwrap());
    }

    let config = JobTokenConfig {
        private_key_env: Some("RCC_FLOW_TEST_PRIVATE_KEY".to_string()),
        public_key_env: Some("RCC_FLOW_TEST_PUBLIC_KEY".to_string()),
        clock_tolerance_seconds: 10,
        ..JobTokenConfig::default()
    };

    let clock = Arc::new(FixedClock::new(NOW));
    let issuer = JobTokenIssuer::from_config(&config).unwrap().with_clock(clock.clone());
    let validator = JobTokenValidator::from_config(&config)
        .unwrap()
        .with_clock(clock.clone());

    let token = issuer.create_job_token("job", "user", None, 0).unwrap();

    // Configured tolerance stretches exp by 10 seconds.
    clock.set(NOW + 300 + 10);
    assert!(validator.validate_job_token(&token).is_ok());

    // SAFETY: Cleanup in test
    unsafe {
        std::env::remove_var("RCC_FLOW_TEST_PRIVATE_KEY");
        std::env::remove_var("RCC_FLOW_TEST_PUBLIC_KEY");
    }
}

#[test]
fn test_from_config_key_files() {
    let _guard = env_guard();
    let keypair = KeyPair::generate().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let private_path = dir.path().join("private.pem");
    let public_path = dir.path().join("public.pem");
    keypair.save_to_files(&private_path, &public_path).unwrap();

    let config = JobTokenConfig {
        private_key_env: None,
        private_key_file: Some(private_path),
        public_key_env: None,
        public_key_file: Some(public_path),
        clock_tolerance_seconds: 0,
    };

    let issuer = JobTokenIssuer::from_config(&config).unwrap();
    let validator = JobTokenValidator::from_config(&config).unwrap();

    let token = issuer.create_job_token("job", "user", Some("org"), 60_000).unwrap();
    let context = validator.validate_job_token(&token).unwrap();
    assert_eq!(context.org_id.as_deref(), Some("org"));
}

/// Missing or broken key material is a startup error, not a rejection.
#[test]
fn test_from_config_bad_keys() {
    let _guard = env_guard();
    let config = JobTokenConfig {
        private_key_env: Some("RCC_FLOW_TEST_UNSET_PRIVATE".to_string()),
        public_key_env: Some("RCC_FLOW_TEST_UNSET_PUBLIC".to_string()),
        ..JobTokenConfig::default()
    };
    let err = JobTokenIssuer::from_config(&config).unwrap_err();
    assert!(matches!(err, JobTokenError::MissingKey(_)));
    assert!(!err.is_rejection());
    assert!(matches!(
        JobTokenValidator::from_config(&config),
        Err(JobTokenError::MissingKey(_))
    ));

    // SAFETY: We're in a test and controlling the environment
    unsafe {
        std::env::set_var("RCC_FLOW_TEST_GARBAGE_KEY", "bm90IGEga2V5");
    }
    let config = JobTokenConfig {
        private_key_env: Some("RCC_FLOW_TEST_GARBAGE_KEY".to_string()),
        ..JobTokenConfig::default()
    };
    assert!(matches!(
        JobTokenIssuer::from_config(&config),
        Err(JobTokenError::InvalidPrivateKey(_))
    ));
    // SAFETY: Cleanup in test
    unsafe {
        std::env::remove_var("RCC_FLOW_TEST_GARBAGE_KEY");
    }
}
