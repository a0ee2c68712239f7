//! User lookup, search and friendship handlers.
//!
//! Friendship routes are written from the caller's point of view: the
//! path id is always the *other* user, the authenticated identity is the
//! acting side.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::identity::UserCard;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /api/user/:id
///
/// Public card plus the viewer's friendship status toward the user.
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let viewer = state.authenticate(&headers)?;
    let target = state.users.find_by_id(&id)?;
    let status = state.friends.status(&viewer.id, &id)?;
    Ok(Json(json!({
        "success": true,
        "user": UserCard::from(&target),
        "friendship_status": status,
    })))
}

/// GET /api/user/search?q=name
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let _ = state.authenticate(&headers)?;
    let results: Vec<UserCard> = state
        .users
        .search_by_name(&query.q)
        .iter()
        .map(UserCard::from)
        .collect();
    Ok(Json(json!({ "success": true, "users": results })))
}

/// GET /api/user/:id/posts?page=&limit=
pub async fn user_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let _ = state.authenticate(&headers)?;
    let (posts, pagination) = state.posts.shared_posts_page(
        &id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.config.page_size),
    )?;
    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "pagination": pagination,
    })))
}

/// POST /api/user/:id/add-friend
pub async fn add_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.friends.send_request(&user.id, &id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/user/:id/accept
pub async fn accept_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.friends.accept_request(&user.id, &id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/user/:id/deny
pub async fn deny_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.friends.deny_request(&user.id, &id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/user/:id/cancel
pub async fn cancel_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.friends.cancel_request(&user.id, &id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/user/:id/unfriend
pub async fn unfriend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.friends.unfriend(&user.id, &id)?;
    Ok(Json(json!({ "success": true })))
}
