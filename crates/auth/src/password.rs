//! Multi-scheme password/secret hashing.
//!
//! Stored digests are a tagged union of `{scheme, payload}`. Verification
//! dispatches on the embedded scheme identifier so digests hashed under an
//! older scheme keep verifying while new hashes use the current default —
//! credential migration without invalidation.

use std::collections::HashMap;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unknown digest scheme '{0}'")]
    UnknownScheme(String),

    #[error("malformed digest: {0}")]
    MalformedDigest(String),

    #[error("hashing failed: {0}")]
    Hash(String),
}

/// A stored credential digest: scheme identifier + scheme-specific payload.
///
/// The plaintext it was derived from is never stored and never re-derivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordDigest {
    pub scheme: String,
    pub payload: String,
}

impl PasswordDigest {
    pub fn new(scheme: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            payload: payload.into(),
        }
    }

    /// Encode as `scheme:payload` for single-column storage.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.scheme, self.payload)
    }

    /// Parse the `scheme:payload` encoding.
    pub fn parse(encoded: &str) -> Result<Self, CryptoError> {
        match encoded.split_once(':') {
            Some((scheme, payload)) if !scheme.is_empty() && !payload.is_empty() => {
                Ok(Self::new(scheme, payload))
            }
            _ => Err(CryptoError::MalformedDigest(
                "expected 'scheme:payload'".to_string(),
            )),
        }
    }
}

/// One hashing scheme in the registry.
pub trait PasswordScheme: Send + Sync {
    fn name(&self) -> &'static str;

    fn hash(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// `Ok(false)` is a clean mismatch; `Err` means the stored payload is
    /// malformed for this scheme.
    fn verify(&self, plaintext: &str, payload: &str) -> Result<bool, CryptoError>;
}

/// Argon2id (PHC string payload). The current default scheme.
#[derive(Debug, Default)]
pub struct Argon2Scheme;

impl PasswordScheme for Argon2Scheme {
    fn name(&self) -> &'static str {
        "argon2id"
    }

    fn hash(&self, plaintext: &str) -> Result<String, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CryptoError::Hash(e.to_string()))
    }

    fn verify(&self, plaintext: &str, payload: &str) -> Result<bool, CryptoError> {
        let parsed = argon2::PasswordHash::new(payload)
            .map_err(|e| CryptoError::MalformedDigest(format!("invalid PHC string: {e}")))?;
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CryptoError::MalformedDigest(format!("verify error: {e}"))),
        }
    }
}

/// Scheme registry: hashes with the current default, verifies by the digest's
/// embedded scheme identifier.
pub struct CredentialHasher {
    schemes: HashMap<&'static str, Box<dyn PasswordScheme>>,
    default_scheme: &'static str,
}

impl CredentialHasher {
    /// A registry with argon2id as the only (and default) scheme.
    pub fn new() -> Self {
        let mut hasher = Self {
            schemes: HashMap::new(),
            default_scheme: "argon2id",
        };
        hasher.register(Box::new(Argon2Scheme));
        hasher
    }

    /// Register an additional scheme (legacy digests, test doubles).
    pub fn register(&mut self, scheme: Box<dyn PasswordScheme>) {
        self.schemes.insert(scheme.name(), scheme);
    }

    /// Register a scheme and make it the default for new hashes.
    pub fn register_default(&mut self, scheme: Box<dyn PasswordScheme>) {
        self.default_scheme = scheme.name();
        self.register(scheme);
    }

    pub fn hash(&self, plaintext: &str) -> Result<PasswordDigest, CryptoError> {
        let scheme = self
            .schemes
            .get(self.default_scheme)
            .ok_or_else(|| CryptoError::UnknownScheme(self.default_scheme.to_string()))?;
        let payload = scheme.hash(plaintext)?;
        Ok(PasswordDigest::new(scheme.name(), payload))
    }

    pub fn verify(&self, plaintext: &str, digest: &PasswordDigest) -> Result<bool, CryptoError> {
        let scheme = self
            .schemes
            .get(digest.scheme.as_str())
            .ok_or_else(|| CryptoError::UnknownScheme(digest.scheme.clone()))?;
        scheme.verify(plaintext, &digest.payload)
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reversed-plaintext "digest". Stands in for a legacy scheme in tests.
    struct ReversedScheme;

    impl PasswordScheme for ReversedScheme {
        fn name(&self) -> &'static str {
            "reversed"
        }

        fn hash(&self, plaintext: &str) -> Result<String, CryptoError> {
            Ok(plaintext.chars().rev().collect())
        }

        fn verify(&self, plaintext: &str, payload: &str) -> Result<bool, CryptoError> {
            Ok(payload.chars().rev().collect::<String>() == plaintext)
        }
    }

    #[test]
    fn default_scheme_hashes_and_verifies() {
        let hasher = CredentialHasher::new();
        let digest = hasher.hash("hunter2").unwrap();

        assert_eq!(digest.scheme, "argon2id");
        assert!(hasher.verify("hunter2", &digest).unwrap());
        assert!(!hasher.verify("wrong", &digest).unwrap());
    }

    #[test]
    fn legacy_digests_verify_while_new_hashes_use_current_default() {
        let mut hasher = CredentialHasher::new();
        hasher.register(Box::new(ReversedScheme));

        let legacy = PasswordDigest::new("reversed", "2retnuh");
        assert!(hasher.verify("hunter2", &legacy).unwrap());

        // New hashes still come out under the default scheme.
        let fresh = hasher.hash("hunter2").unwrap();
        assert_eq!(fresh.scheme, "argon2id");
    }

    #[test]
    fn unknown_scheme_is_an_error_not_a_mismatch() {
        let hasher = CredentialHasher::new();
        let digest = PasswordDigest::new("bcrypt", "whatever");
        assert!(matches!(
            hasher.verify("pw", &digest),
            Err(CryptoError::UnknownScheme(_))
        ));
    }

    #[test]
    fn digest_encoding_round_trips() {
        let digest = PasswordDigest::new("argon2id", "$argon2id$v=19$m=19456,t=2,p=1$abc$def");
        let parsed = PasswordDigest::parse(&digest.encode()).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn malformed_encoding_is_rejected() {
        assert!(PasswordDigest::parse("no-separator").is_err());
        assert!(PasswordDigest::parse(":payload-only").is_err());
    }
}
