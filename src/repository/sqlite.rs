//! SQLite Repository
//!
//! One rusqlite connection behind a mutex. Every query runs on tokio's
//! blocking pool so handlers never stall the async workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::error::{RepositoryError, RepositoryResult};
use super::types::{NewPost, NewUser, Post, PostUpdate, User};
use super::Repository;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
";

/// SQLite-backed [`Repository`]
#[derive(Clone)]
pub struct SqliteRepository {
    /// std::sync::Mutex because rusqlite::Connection is not Sync
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open or create a database file
    pub fn open(path: &Path) -> RepositoryResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> RepositoryResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> RepositoryResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn call<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RepositoryResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::Lock(e.to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| RepositoryError::Task(e.to_string()))?
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
    })
}

/// Post as stored, before the timestamp is decoded
struct PostRow {
    id: i64,
    post_content: String,
    created_at: i64,
    user_id: i64,
}

impl PostRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_content: row.get(1)?,
            created_at: row.get(2)?,
            user_id: row.get(3)?,
        })
    }

    fn into_post(self) -> RepositoryResult<Post> {
        let create_at = DateTime::<Utc>::from_timestamp_millis(self.created_at).ok_or_else(|| {
            RepositoryError::Corruption(format!(
                "post {} has invalid timestamp {}",
                self.id, self.created_at
            ))
        })?;

        Ok(Post {
            id: self.id,
            post_content: self.post_content,
            create_at,
            user_id: self.user_id,
        })
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert_user(&self, user: NewUser) -> RepositoryResult<User> {
        self.call(move |conn| {
            match conn.execute(
                "INSERT INTO users (email, password) VALUES (?1, ?2)",
                params![user.email, user.password],
            ) {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(RepositoryError::Conflict(format!(
                        "email {} is already registered",
                        user.email
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            Ok(User {
                id: conn.last_insert_rowid(),
                email: user.email,
                password: user.password,
            })
        })
        .await
    }

    async fn get_user_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        self.call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, email, password FROM users WHERE id = ?1",
                    params![id],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let email = email.to_string();
        self.call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, email, password FROM users WHERE email = ?1",
                    params![email],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn insert_post(&self, post: NewPost) -> RepositoryResult<Post> {
        self.call(move |conn| {
            let create_at = Utc::now();
            conn.execute(
                "INSERT INTO posts (post_content, created_at, user_id) VALUES (?1, ?2, ?3)",
                params![post.post_content, create_at.timestamp_millis(), post.user_id],
            )?;

            Ok(Post {
                id: conn.last_insert_rowid(),
                post_content: post.post_content,
                create_at,
                user_id: post.user_id,
            })
        })
        .await
    }

    async fn get_post_by_id(&self, id: i64) -> RepositoryResult<Option<Post>> {
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, post_content, created_at, user_id FROM posts WHERE id = ?1",
                params![id],
                PostRow::from_row,
            )
            .optional()?
            .map(PostRow::into_post)
            .transpose()
        })
        .await
    }

    async fn update_post(&self, update: PostUpdate) -> RepositoryResult<bool> {
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET post_content = ?1 WHERE id = ?2 AND user_id = ?3",
                params![update.post_content, update.id, update.user_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_post(&self, id: i64, user_id: i64) -> RepositoryResult<bool> {
        self.call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list_posts(&self, page: u64, page_size: u64) -> RepositoryResult<Vec<Post>> {
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let offset = i64::try_from(page.saturating_mul(page_size)).unwrap_or(i64::MAX);

        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, post_content, created_at, user_id FROM posts
                 ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )?;

            let rows = stmt
                .query_map(params![limit, offset], PostRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(PostRow::into_post).collect()
        })
        .await
    }
}
