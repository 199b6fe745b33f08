//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Ready once the database answers and the hub dispatcher is running.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    let database_ok = check_database_health(&state).await;
    let hub_ok = state.ws_connection_count().await.is_ok();

    if database_ok && hub_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database_ok = check_database_health(&state).await;
    let sessions = state.ws_connection_count().await;
    let hub_ok = sessions.is_ok();

    let overall_status = if database_ok && hub_ok {
        "healthy"
    } else if database_ok || hub_ok {
        "degraded"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: overall_status.to_string(),
        database: if database_ok { "ok" } else { "error" }.to_string(),
        hub: if hub_ok { "ok" } else { "stopped" }.to_string(),
        ws_sessions: sessions.unwrap_or(0),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Cheapest query that still touches the database
async fn check_database_health(state: &AppState) -> bool {
    match state.repository.get_user_by_id(0).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
