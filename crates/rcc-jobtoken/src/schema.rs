//! Field-level validation of verified claim sets.
//!
//! Every field is checked and every violation collected, so a broken
//! producer can be diagnosed from a single rejection.

use crate::claims::{JOB_TOKEN_ISSUER, JOB_TOKEN_VERSION, JobTokenPayload, TokenType};
use crate::error::FieldViolation;
use serde_json::{Map, Value};

/// Validate a claim set against the job token schema.
///
/// Returns the typed payload, or every violation found.
pub fn validate_claims(claims: &Value) -> Result<JobTokenPayload, Vec<FieldViolation>> {
    let Some(obj) = claims.as_object() else {
        return Err(vec![FieldViolation::new("", "claims must be a JSON object")]);
    };

    let mut violations = Vec::new();

    if let Some(iss) = string_field(obj, "iss", "iss", &mut violations) {
        if iss != JOB_TOKEN_ISSUER {
            violations.push(FieldViolation::new(
                "iss",
                format!("must equal \"{JOB_TOKEN_ISSUER}\", got \"{iss}\""),
            ));
        }
    }

    non_empty_string_field(obj, "sub", "sub", &mut violations);

    let exp = positive_integer_field(obj, "exp", &mut violations);
    let iat = positive_integer_field(obj, "iat", &mut violations);
    positive_integer_field(obj, "nbf", &mut violations);
    if let (Some(exp), Some(iat)) = (exp, iat) {
        if exp <= iat {
            violations.push(FieldViolation::new(
                "exp",
                format!("must be after iat ({iat}), got {exp}"),
            ));
        }
    }

    match obj.get("v") {
        None => violations.push(FieldViolation::new("v", "is required")),
        Some(v) => match v.as_i64() {
            Some(v) if v == i64::from(JOB_TOKEN_VERSION) => {}
            Some(v) => violations.push(FieldViolation::new(
                "v",
                format!("unsupported version: must equal {JOB_TOKEN_VERSION}, got {v}"),
            )),
            None => violations.push(FieldViolation::new("v", "expected an integer")),
        },
    }

    match obj.get("r") {
        None => violations.push(FieldViolation::new("r", "is required")),
        Some(Value::Object(rights)) => validate_rights(rights, &mut violations),
        Some(_) => violations.push(FieldViolation::new("r", "expected an object")),
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    serde_json::from_value(claims.clone())
        .map_err(|e| vec![FieldViolation::new("", format!("claims do not deserialize: {e}"))])
}

fn validate_rights(rights: &Map<String, Value>, violations: &mut Vec<FieldViolation>) {
    non_empty_string_field(rights, "u", "r.u", violations);

    // Absent is fine; present must be a string (null is not absent).
    if let Some(org) = rights.get("o") {
        if !org.is_string() {
            violations.push(FieldViolation::new("r.o", "expected a string when present"));
        }
    }

    let expected = TokenType::CloudJob.as_str();
    if let Some(t) = string_field(rights, "t", "r.t", violations) {
        if t != expected {
            violations.push(FieldViolation::new(
                "r.t",
                format!("token type mismatch: expected \"{expected}\", got \"{t}\""),
            ));
        }
    }
}

fn string_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<&'a str> {
    match obj.get(key) {
        None => {
            violations.push(FieldViolation::new(path, "is required"));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            violations.push(FieldViolation::new(path, "expected a string"));
            None
        }
    }
}

fn non_empty_string_field(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) {
    if let Some(s) = string_field(obj, key, path, violations) {
        if s.is_empty() {
            violations.push(FieldViolation::new(path, "must not be empty"));
        }
    }
}

fn positive_integer_field(
    obj: &Map<String, Value>,
    key: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<i64> {
    match obj.get(key) {
        None => {
            violations.push(FieldViolation::new(key, "is required"));
            None
        }
        Some(value) => match value.as_i64() {
            Some(n) if n > 0 => Some(n),
            Some(n) => {
                violations.push(FieldViolation::new(key, format!("must be positive, got {n}")));
                None
            }
            None => {
                violations.push(FieldViolation::new(key, "expected an integer timestamp"));
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_claims() -> Value {
        json!({
            "iss": "rcc",
            "sub": "job-123",
            "exp": 1_672_533_300,
            "iat": 1_672_531_200,
            "nbf": 1_672_531_170,
            "v": 1,
            "r": { "u": "user-456", "o": "org-789", "t": "cj" }
        })
    }

    fn paths(violations: &[FieldViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn test_valid_claims() {
        let payload = validate_claims(&valid_claims()).unwrap();
        assert_eq!(payload.sub, "job-123");
        assert_eq!(payload.r.o.as_deref(), Some("org-789"));
    }

    #[test]
    fn test_org_may_be_absent() {
        let mut claims = valid_claims();
        claims["r"].as_object_mut().unwrap().remove("o");
        let payload = validate_claims(&claims).unwrap();
        assert!(payload.r.o.is_none());
    }

    #[test]
    fn test_null_org_is_rejected() {
        let mut claims = valid_claims();
        claims["r"]["o"] = Value::Null;
        let violations = validate_claims(&claims).unwrap_err();
        assert_eq!(paths(&violations), vec!["r.o"]);
    }

    #[test]
    fn test_empty_user() {
        let mut claims = valid_claims();
        claims["r"]["u"] = json!("");
        let violations = validate_claims(&claims).unwrap_err();
        assert_eq!(paths(&violations), vec!["r.u"]);
    }

    #[test]
    fn test_wrong_version() {
        let mut claims = valid_claims();
        claims["v"] = json!(2);
        let violations = validate_claims(&claims).unwrap_err();
        assert_eq!(paths(&violations), vec!["v"]);
        assert!(violations[0].reason.contains("got 2"));
    }

    #[test]
    fn test_wrong_token_type() {
        let mut claims = valid_claims();
        claims["r"]["t"] = json!("agent");
        let violations = validate_claims(&claims).unwrap_err();
        assert_eq!(paths(&violations), vec!["r.t"]);
        assert!(violations[0].reason.contains("token type mismatch"));
    }

    #[test]
    fn test_every_violation_is_reported() {
        let claims = json!({
            "iss": "rcc",
            "sub": "",
            "exp": "soon",
            "iat": 0,
            "nbf": -5,
            "v": 2,
            "r": { "u": "", "t": "agent" }
        });
        let violations = validate_claims(&claims).unwrap_err();
        assert_eq!(
            paths(&violations),
            vec!["sub", "exp", "iat", "nbf", "v", "r.u", "r.t"]
        );
    }

    #[test]
    fn test_missing_fields() {
        let violations = validate_claims(&json!({ "iss": "rcc" })).unwrap_err();
        assert_eq!(paths(&violations), vec!["sub", "exp", "iat", "nbf", "v", "r"]);
        assert!(violations.iter().all(|v| v.reason == "is required"));
    }

    #[test]
    fn test_exp_must_follow_iat() {
        let mut claims = valid_claims();
        claims["exp"] = claims["iat"].clone();
        let violations = validate_claims(&claims).unwrap_err();
        assert_eq!(paths(&violations), vec!["exp"]);
    }

    #[test]
    fn test_non_object_claims() {
        let violations = validate_claims(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "");
    }
}
