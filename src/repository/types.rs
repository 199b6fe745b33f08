//! Persisted record types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// bcrypt hash, never sent to clients
    #[serde(skip_serializing)]
    pub password: String,
}

/// Account to be inserted; `password` is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
}

/// A blog post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub post_content: String,
    pub create_at: DateTime<Utc>,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_content: String,
    pub user_id: i64,
}

/// Content change to a post, applied only if `user_id` owns it
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub id: i64,
    pub post_content: String,
    pub user_id: i64,
}
