//! Password hashing with Argon2id.
//!
//! Hashing is CPU-bound, so handlers use the `*_blocking` variants which run
//! on the Tokio blocking pool.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use medlens_core::{AppError, StatusExt};

/// Hash verified when the account does not exist, so unknown emails cost the
/// same time as wrong passwords.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash("medlens-placeholder-password").ok());

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `AppError::Internal` if password hashing fails.
pub fn hash(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hash error: {e}")))
}

/// Verify a password against a PHC-format hash. Malformed hashes never match.
#[must_use]
pub fn verify(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash`] on the blocking pool.
pub async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(&password))
        .await
        .status("Password hashing task failed")?
}

/// [`verify`] on the blocking pool. `None` verifies against a placeholder
/// hash and always returns `false`.
pub async fn verify_blocking(password: String, hash: Option<String>) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify(&password, &hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify(&password, dummy);
            }
            false
        }
    })
    .await
    .status("Password verification task failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash("correct horse 1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify("correct horse 1", &hash));
        assert!(!verify("correct horse 2", &hash));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash("same_password1").unwrap(), hash("same_password1").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn blocking_variants() {
        let hash = hash_blocking("pa55word".to_string()).await.unwrap();
        assert!(verify_blocking("pa55word".to_string(), Some(hash)).await.unwrap());
        assert!(!verify_blocking("pa55word".to_string(), None).await.unwrap());
    }
}
