//! P-256 key material for signing and verifying job tokens.
//!
//! Keys travel as PEM (PKCS#8 private, SPKI public). In environment
//! variables the PEM text is additionally base64-encoded so it fits on one
//! line; every loader here accepts either form.

use crate::error::JobTokenError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use std::fmt;
use std::path::Path;

const PEM_PREFIX: &str = "-----BEGIN";

// A random 32-byte string is almost always a valid scalar; this only guards
// against a broken RNG.
const MAX_GENERATION_ATTEMPTS: usize = 8;

/// Decode key material given either as PEM text or base64-encoded PEM.
pub fn decode_key_material(material: &str) -> Result<String, String> {
    let trimmed = material.trim();
    if trimmed.starts_with(PEM_PREFIX) {
        return Ok(trimmed.to_string());
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| format!("key is neither PEM nor base64-encoded PEM: {e}"))?;
    let pem = String::from_utf8(bytes).map_err(|_| "decoded key is not UTF-8 text".to_string())?;

    if !pem.trim_start().starts_with(PEM_PREFIX) {
        return Err("decoded key is not PEM".to_string());
    }
    Ok(pem.trim().to_string())
}

/// Private key used by the issuer.
#[derive(Clone)]
pub struct SigningKey {
    inner: EncodingKey,
}

impl SigningKey {
    /// Parse a PKCS#8 PEM private key. The key must be on P-256.
    pub fn from_pem(pem: &str) -> Result<Self, JobTokenError> {
        SecretKey::from_pkcs8_pem(pem)
            .map_err(|e| JobTokenError::InvalidPrivateKey(format!("expected a P-256 PKCS#8 key: {e}")))?;
        let inner = EncodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| JobTokenError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse a private key given as PEM or base64-encoded PEM.
    pub fn from_key_material(material: &str) -> Result<Self, JobTokenError> {
        let pem = decode_key_material(material).map_err(JobTokenError::InvalidPrivateKey)?;
        Self::from_pem(&pem)
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.inner
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

/// Public key used by the validator.
#[derive(Clone)]
pub struct VerifyingKey {
    inner: DecodingKey,
}

impl VerifyingKey {
    /// Parse an SPKI PEM public key. The key must be on P-256.
    pub fn from_pem(pem: &str) -> Result<Self, JobTokenError> {
        PublicKey::from_public_key_pem(pem)
            .map_err(|e| JobTokenError::InvalidPublicKey(format!("expected a P-256 public key: {e}")))?;
        let inner = DecodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| JobTokenError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse a public key given as PEM or base64-encoded PEM.
    pub fn from_key_material(material: &str) -> Result<Self, JobTokenError> {
        let pem = decode_key_material(material).map_err(JobTokenError::InvalidPublicKey)?;
        Self::from_pem(&pem)
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.inner
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey").finish_non_exhaustive()
    }
}

/// A P-256 keypair for provisioning issuers and validators.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Result<Self, JobTokenError> {
        let mut rng = rand::rng();
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                return Ok(Self { secret });
            }
        }
        Err(JobTokenError::KeyGenerationFailed(format!(
            "no valid P-256 scalar after {MAX_GENERATION_ATTEMPTS} attempts"
        )))
    }

    /// Load a keypair from a PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, JobTokenError> {
        let secret = SecretKey::from_pkcs8_pem(pem)
            .map_err(|e| JobTokenError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { secret })
    }

    /// Load a keypair from PEM or base64-encoded PEM.
    pub fn from_key_material(material: &str) -> Result<Self, JobTokenError> {
        let pem = decode_key_material(material).map_err(JobTokenError::InvalidPrivateKey)?;
        Self::from_pem(&pem)
    }

    /// Get the private key as PKCS#8 PEM.
    pub fn private_key_pem(&self) -> Result<String, JobTokenError> {
        self.secret
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| JobTokenError::InvalidPrivateKey(e.to_string()))
    }

    /// Get the public key as SPKI PEM.
    pub fn public_key_pem(&self) -> Result<String, JobTokenError> {
        self.secret
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JobTokenError::InvalidPublicKey(e.to_string()))
    }

    /// Get the private key as base64-encoded PEM (the environment variable form).
    pub fn private_key_base64(&self) -> Result<String, JobTokenError> {
        Ok(STANDARD.encode(self.private_key_pem()?))
    }

    /// Get the public key as base64-encoded PEM (the environment variable form).
    pub fn public_key_base64(&self) -> Result<String, JobTokenError> {
        Ok(STANDARD.encode(self.public_key_pem()?))
    }

    /// Signing half, ready for a [`crate::JobTokenIssuer`].
    pub fn signing_key(&self) -> Result<SigningKey, JobTokenError> {
        SigningKey::from_pem(&self.private_key_pem()?)
    }

    /// Verifying half, ready for a [`crate::JobTokenValidator`].
    pub fn verifying_key(&self) -> Result<VerifyingKey, JobTokenError> {
        VerifyingKey::from_pem(&self.public_key_pem()?)
    }

    /// Save the keypair as PEM files.
    pub fn save_to_files(
        &self,
        private_key_path: &Path,
        public_key_path: &Path,
    ) -> Result<(), JobTokenError> {
        std::fs::write(private_key_path, self.private_key_pem()?)?;
        std::fs::write(public_key_path, self.public_key_pem()?)?;
        Ok(())
    }

    /// Load a keypair from a private key file (PEM or base64-encoded PEM).
    pub fn load_from_file(private_key_path: &Path) -> Result<Self, JobTokenError> {
        let material = std::fs::read_to_string(private_key_path)?;
        Self::from_key_material(&material)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").finish_non_exhaustive()
    }
}

/// Load a verifying key from base64-encoded PEM (for verification-only services).
pub fn load_verifying_key_base64(material: &str) -> Result<VerifyingKey, JobTokenError> {
    VerifyingKey::from_key_material(material)
}

/// Load a verifying key from a file.
pub fn load_verifying_key_file(path: &Path) -> Result<VerifyingKey, JobTokenError> {
    let material = std::fs::read_to_string(path)?;
    VerifyingKey::from_key_material(&material)
}
