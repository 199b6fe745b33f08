//! Access tokens
//!
//! Tokens are HS256 JWTs whose payload is exactly [`Claims`]. Expiry is
//! checked by [`TokenService::validate`] itself rather than by the JWT
//! library's registered-claim handling.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::{AuthError, AuthResult};

/// Token payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Unix timestamp in seconds
    pub expires_at: i64,
}

impl Claims {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Issues and validates access tokens with a shared secret
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        let ttl_secs = i64::try_from(ttl_hours.saturating_mul(3600)).unwrap_or(i64::MAX);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Issue a token for a user, valid for the configured TTL
    pub fn issue(&self, user_id: i64) -> AuthResult<String> {
        let claims = Claims {
            user_id,
            expires_at: Utc::now().timestamp().saturating_add(self.ttl_secs),
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify the signature, decode the claims and reject expired tokens
    pub fn validate(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token validation failed");
                AuthError::InvalidToken(e.to_string())
            })?
            .claims;

        if claims.is_expired(Utc::now().timestamp()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_validate() {
        let tokens = TokenService::new("secret", 48);
        let token = tokens.issue(42).unwrap();

        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert!(claims.expires_at > Utc::now().timestamp() + 47 * 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("secret", 48);
        let token = tokens
            .sign(&Claims {
                user_id: 1,
                expires_at: Utc::now().timestamp() - 10,
            })
            .unwrap();

        assert!(matches!(tokens.validate(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenService::new("secret", 48);
        let other = TokenService::new("another-secret", 48);
        let token = issuer.issue(1).unwrap();

        assert!(matches!(other.validate(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = TokenService::new("secret", 48);
        assert!(matches!(
            tokens.validate("not.a.token"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
