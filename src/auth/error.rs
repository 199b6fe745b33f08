//! Authentication error types

use thiserror::Error;

/// Errors raised while issuing or checking credentials
#[derive(Error, Debug)]
pub enum AuthError {
    /// No token in the request
    #[error("Missing authorization token")]
    MissingToken,

    /// Signature, encoding or claims are not acceptable
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The token's `expires_at` has passed
    #[error("Token expired")]
    TokenExpired,

    /// E-mail unknown or password mismatch
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Signing or hashing failed
    #[error("Internal auth error: {0}")]
    Internal(String),
}

/// Result type alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;
