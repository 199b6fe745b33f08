//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

// ============================================
// USER DTOs
// ============================================

/// Signup and login request
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Signup response
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: i64,
    pub email: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

// ============================================
// POST DTOs
// ============================================

/// Create or update a post
#[derive(Debug, Deserialize)]
pub struct UpsertPostRequest {
    pub post_content: String,
}

/// Created post summary
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub post_content: String,
}

/// Generic confirmation message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Query parameters for listing posts
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsParams {
    /// Zero-based page number
    #[serde(default)]
    pub page: Option<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub hub: String,
    pub ws_sessions: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
