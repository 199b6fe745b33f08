//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::TokenService;
use crate::config::Config;
use crate::repository::Repository;
use crate::websocket::{ConnectionHub, HubError};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Users and posts
    pub repository: Arc<dyn Repository>,
    /// Token issuing and validation
    pub tokens: Arc<TokenService>,
    /// Producer handle onto the WebSocket hub
    pub hub: ConnectionHub,
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(repository: Arc<dyn Repository>, hub: ConnectionHub, config: Config) -> Self {
        let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);

        Self {
            repository,
            tokens: Arc::new(tokens),
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> Result<usize, HubError> {
        self.hub.connection_count().await
    }
}
