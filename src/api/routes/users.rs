//! User Routes
//!
//! - POST /api/v1/signup - Create an account
//! - POST /api/v1/login - Exchange credentials for a token
//! - GET /api/v1/me - Current user

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{CredentialsRequest, LoginResponse, SignupResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::AuthUser;
use crate::api::state::AppState;
use crate::auth::{password, AuthError};
use crate::repository::{NewUser, User};

/// POST /api/v1/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    validate_credentials(&req)?;

    let hashed = password::hash(req.password, state.config.auth.bcrypt_cost).await?;
    let user = state
        .repository
        .insert_user(NewUser {
            email: req.email.trim().to_string(),
            password: hashed,
        })
        .await?;

    tracing::info!(user_id = user.id, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validate_credentials(&req)?;

    let user = state
        .repository
        .get_user_by_email(req.email.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !password::verify(req.password, user.password).await? {
        tracing::debug!(user_id = user.id, "Password mismatch");
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(user.id)?;
    Ok(Json(LoginResponse { token }))
}

/// GET /api/v1/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<User>> {
    let user = state
        .repository
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", claims.user_id)))?;

    Ok(Json(user))
}

fn validate_credentials(req: &CredentialsRequest) -> ApiResult<()> {
    if req.email.trim().is_empty() {
        return Err(ApiError::Validation("Email cannot be empty".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("Password cannot be empty".to_string()));
    }
    Ok(())
}
