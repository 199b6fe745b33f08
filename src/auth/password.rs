//! Password hashing
//!
//! Both operations are CPU-bound and run on the blocking pool.

use super::error::{AuthError, AuthResult};

/// Hash a password with the given bcrypt cost
pub async fn hash(password: String, cost: u32) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored bcrypt hash
pub async fn verify(password: String, hashed: String) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(format!("Failed to verify password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash("s3cret".to_string(), 4).await.unwrap();
        assert_ne!(hashed, "s3cret");

        assert!(verify("s3cret".to_string(), hashed.clone()).await.unwrap());
        assert!(!verify("wrong".to_string(), hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_rejects_malformed_hash() {
        let result = verify("s3cret".to_string(), "not-a-hash".to_string()).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
