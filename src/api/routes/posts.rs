//! Post Routes
//!
//! - POST /api/v1/posts - Create a post and notify live clients
//! - GET /api/v1/posts?page=N - List posts, newest first
//! - GET /api/v1/posts/:id - Fetch one post
//! - PUT /api/v1/posts/:id - Edit an own post
//! - DELETE /api/v1/posts/:id - Delete an own post

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ListPostsParams, MessageResponse, PostResponse, UpsertPostRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::AuthUser;
use crate::api::state::AppState;
use crate::repository::{NewPost, Post, PostUpdate};
use crate::websocket::DomainEvent;

/// POST /api/v1/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(req): Json<UpsertPostRequest>,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    validate_content(&req.post_content)?;

    let post = state
        .repository
        .insert_post(NewPost {
            post_content: req.post_content,
            user_id: claims.user_id,
        })
        .await?;

    tracing::info!(post_id = post.id, user_id = post.user_id, "Post created");
    notify_post_created(&state, &post).await;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post.id,
            post_content: post.post_content,
        }),
    ))
}

/// GET /api/v1/posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<Json<Vec<Post>>> {
    let page = match params.page.as_deref() {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ApiError::Validation(format!("Invalid page: {}", raw)))?,
    };

    let posts = state
        .repository
        .list_posts(page, state.config.server.page_size)
        .await?;

    Ok(Json(posts))
}

/// GET /api/v1/posts/:id
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Post>> {
    let post = state
        .repository
        .get_post_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {}", id)))?;

    Ok(Json(post))
}

/// PUT /api/v1/posts/:id
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpsertPostRequest>,
) -> ApiResult<Json<MessageResponse>> {
    validate_content(&req.post_content)?;

    let updated = state
        .repository
        .update_post(PostUpdate {
            id,
            post_content: req.post_content,
            user_id: claims.user_id,
        })
        .await?;

    if !updated {
        return Err(ApiError::NotFound(format!("post {}", id)));
    }

    Ok(Json(MessageResponse {
        message: "Post Updated".to_string(),
    }))
}

/// DELETE /api/v1/posts/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.repository.delete_post(id, claims.user_id).await? {
        return Err(ApiError::NotFound(format!("post {}", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Fan the new post out to live clients. Best-effort: the request has
/// already succeeded whatever happens here.
async fn notify_post_created(state: &AppState, post: &Post) {
    let event = match DomainEvent::post_created(post) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(post_id = post.id, error = %e, "Failed to build Post_Created event");
            return;
        }
    };

    if let Err(e) = state.hub.broadcast(event, None).await {
        tracing::warn!(post_id = post.id, error = %e, "Post_Created not broadcast");
    }
}

fn validate_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::Validation("Post content cannot be empty".to_string()));
    }
    Ok(())
}
