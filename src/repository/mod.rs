//! Persistence
//!
//! Handlers reach storage only through the [`Repository`] trait, injected
//! into the application state as `Arc<dyn Repository>`.
//! [`SqliteRepository`] is the production implementation.

mod error;
mod sqlite;
mod types;

pub use error::{RepositoryError, RepositoryResult};
pub use sqlite::SqliteRepository;
pub use types::{NewPost, NewUser, Post, PostUpdate, User};

use async_trait::async_trait;

/// Storage for users and posts
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert a user; fails with `Conflict` if the e-mail is taken
    async fn insert_user(&self, user: NewUser) -> RepositoryResult<User>;

    async fn get_user_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    async fn insert_post(&self, post: NewPost) -> RepositoryResult<Post>;

    async fn get_post_by_id(&self, id: i64) -> RepositoryResult<Option<Post>>;

    /// Returns false if no post with that id belongs to the user
    async fn update_post(&self, update: PostUpdate) -> RepositoryResult<bool>;

    /// Returns false if no post with that id belongs to the user
    async fn delete_post(&self, id: i64, user_id: i64) -> RepositoryResult<bool>;

    /// Zero-based page of posts, newest first
    async fn list_posts(&self, page: u64, page_size: u64) -> RepositoryResult<Vec<Post>>;
}
