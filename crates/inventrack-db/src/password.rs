//! Password hashing (Argon2id, random salt per password, PHC string format).
//!
//! Argon2 is CPU-bound; async callers use the `_task` variants, which run
//! on tokio's blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use tokio::task;

use crate::error::{DbError, DbResult};

/// Hash a password for storage.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// A malformed hash is treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_task(password: &str) -> DbResult<String> {
    let password = password.to_string();
    task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| DbError::Internal(format!("Password hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_task(password: &str, hash: &str) -> DbResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| DbError::Internal(format!("Password verification task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("rahasia123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("rahasia123", &hash));
        assert!(!verify_password("salah", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let a = hash_password("rahasia123").unwrap();
        let b = hash_password("rahasia123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_task_variants_agree_with_sync() {
        let hash = hash_password_task("rahasia123").await.unwrap();

        assert!(verify_password("rahasia123", &hash));
        assert!(verify_password_task("rahasia123", &hash).await.unwrap());
        assert!(!verify_password_task("salah", &hash).await.unwrap());
        assert!(!verify_password_task("rahasia123", "not-a-phc-string").await.unwrap());
    }
}
