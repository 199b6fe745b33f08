//! # Postwire
//!
//! Blog backend with live post notifications. Users sign up, log in and
//! publish posts over a REST API; every new post is pushed to connected
//! WebSocket clients as a `Post_Created` event.
//!
//! ## Modules
//!
//! - [`websocket`]: Connection hub, dispatcher and client sessions
//! - [`repository`]: User and post storage behind the [`Repository`] trait
//! - [`auth`]: Access tokens and password hashing
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use postwire::{websocket::DomainEvent, ConnectionHub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (hub, dispatcher) = ConnectionHub::new(HubConfig::default());
//!     tokio::spawn(dispatcher.run(std::future::pending()));
//!
//!     let event = DomainEvent::new("Post_Created", serde_json::json!({"id": 1}))?;
//!     hub.broadcast(event, None).await?;
//!
//!     println!("{} live clients", hub.connection_count().await?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod repository;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError};

pub use repository::{Post, Repository, RepositoryError, SqliteRepository, User};

pub use websocket::{ClientSession, CloseReason, ConnectionHub, DomainEvent, HubConfig, HubError};
