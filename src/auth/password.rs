//! Password hashing for authdb.
//!
//! Uses Argon2id. Hashes are PHC strings, so the algorithm, cost parameters
//! and salt travel with the digest.

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;
use tracing::debug;

use crate::config::HashingConfig;

/// Input run against the stand-in hash when an account has no usable credential.
const DUMMY_PASSWORD: &str = "authdb-no-such-credential";

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Argon2 cost parameters were rejected.
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// Argon2id hasher with configured cost.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher from cost parameters.
    pub fn new(config: &HashingConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password with a fresh random salt.
    ///
    /// ```
    /// use authdb::auth::PasswordHasher;
    /// use authdb::config::HashingConfig;
    ///
    /// let hasher = PasswordHasher::new(&HashingConfig { memory_kib: 256, iterations: 1, parallelism: 1 }).unwrap();
    /// let hash = hasher.hash("pw1").unwrap();
    /// assert!(hash.starts_with("$argon2id$"));
    /// assert!(hasher.verify(&hash, "pw1"));
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, plaintext)
    }

    /// Check a password against a stored PHC hash.
    ///
    /// The digest comparison is constant-time. Parameters are taken from the
    /// stored hash, so hashes made under older settings still verify. A
    /// malformed hash never matches.
    pub fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend one verification's worth of work and report no match.
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(&self.dummy_hash, plaintext);
        false
    }

    /// [`hash`](Self::hash) on the blocking thread pool.
    pub async fn hash_async(self: &Arc<Self>, plaintext: &str) -> Result<String, PasswordError> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool.
    ///
    /// With no hash to check against, a dummy verification runs instead so
    /// the caller cannot tell the two cases apart by latency.
    pub async fn verify_async(
        self: &Arc<Self>,
        hash: Option<String>,
        plaintext: &str,
    ) -> Result<bool, PasswordError> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&hash, &plaintext),
            None => hasher.verify_dummy(&plaintext),
        })
        .await
        .map_err(|e| PasswordError::HashError(e.to_string()))
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> HashingConfig {
        HashingConfig {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(&fast_config()).unwrap()
    }

    #[test]
    fn test_hash_is_phc_string() {
        let hash = hasher().hash("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("$v=19$"));
        assert!(hash.contains("m=256"));
        assert!(hash.contains("t=1"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_hash_uses_fresh_salt() {
        let hasher = hasher();
        let hash1 = hasher.hash("same_password").unwrap();
        let hash2 = hasher.hash("same_password").unwrap();
        assert_ne!(hash1, hash2);
        assert!(hasher.verify(&hash1, "same_password"));
        assert!(hasher.verify(&hash2, "same_password"));
    }

    #[test]
    fn test_verify_correct_and_wrong() {
        let hasher = hasher();
        let hash = hasher.hash("pw1").unwrap();
        assert!(hasher.verify(&hash, "pw1"));
        assert!(!hasher.verify(&hash, "pw2"));
        assert!(!hasher.verify(&hash, ""));
    }

    #[test]
    fn test_verify_malformed_hash() {
        let hasher = hasher();
        assert!(!hasher.verify("not_a_valid_hash", "anything"));
        assert!(!hasher.verify("", "anything"));
    }

    #[test]
    fn test_verify_hash_from_other_params() {
        let strong = PasswordHasher::new(&HashingConfig {
            memory_kib: 512,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("portable").unwrap();
        assert!(hasher().verify(&hash, "portable"));
    }

    #[test]
    fn test_verify_dummy_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify_dummy(DUMMY_PASSWORD));
        assert!(!hasher.verify_dummy("pw1"));
    }

    #[test]
    fn test_invalid_params() {
        let result = PasswordHasher::new(&HashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(matches!(result, Err(PasswordError::InvalidParams(_))));
    }

    #[test]
    fn test_unicode_password() {
        let hasher = hasher();
        let hash = hasher.hash("パスワード123").unwrap();
        assert!(hasher.verify(&hash, "パスワード123"));
    }

    #[tokio::test]
    async fn test_async_variants() {
        let hasher = Arc::new(hasher());
        let hash = hasher.hash_async("pw1").await.unwrap();
        assert!(hasher.verify_async(Some(hash.clone()), "pw1").await.unwrap());
        assert!(!hasher.verify_async(Some(hash), "nope").await.unwrap());
        assert!(!hasher.verify_async(None, "pw1").await.unwrap());
    }
}
