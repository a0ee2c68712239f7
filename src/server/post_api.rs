//! Post and comment handlers.
//!
//! Edit and delete are owner-only; the ownership check runs through the
//! authorization gate before the service is touched.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::server::user_api::PageQuery;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
    pub content: String,
    #[serde(default)]
    pub media: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBody {
    pub content: String,
}

/// POST /api/post
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePostBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let post = state.posts.create_post(&user.id, &body.content, body.media)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "post": post })),
    ))
}

/// GET /api/post/:id
pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let _ = state.authenticate(&headers)?;
    let post = state.posts.get_post(&id)?;
    Ok(Json(json!({ "success": true, "post": post })))
}

/// PUT /api/post/:id
pub async fn edit_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ContentBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let post = state.posts.get_post(&id)?;
    state.gate.require_ownership(&post.user_id, &user)?;

    let post = state.posts.edit_post(&id, &body.content)?;
    Ok(Json(json!({ "success": true, "post": post })))
}

/// DELETE /api/post/:id
pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let post = state.posts.get_post(&id)?;
    state.gate.require_ownership(&post.user_id, &user)?;

    state.posts.delete_post(&id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/post/:id/like
pub async fn like_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.posts.like_post(&id, &user.id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/post/:id/unlike
pub async fn unlike_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.posts.unlike_post(&id, &user.id)?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/post/:id/comments?page=&limit=
pub async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let _ = state.authenticate(&headers)?;
    let (comments, pagination) =
        state
            .posts
            .comments_page(&id, query.page.unwrap_or(1), query.limit)?;
    Ok(Json(json!({
        "success": true,
        "comments": comments,
        "pagination": pagination,
    })))
}

/// POST /api/post/:id/comment
pub async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ContentBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let comment = state.posts.add_comment(&id, &user.id, &body.content)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "comment": comment })),
    ))
}

/// PUT /api/post/:post_id/comment/:comment_id
pub async fn edit_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, comment_id)): Path<(String, String)>,
    Json(body): Json<ContentBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let comment = state.posts.get_comment(&post_id, &comment_id)?;
    state.gate.require_ownership(&comment.user_id, &user)?;

    let comment = state.posts.edit_comment(&post_id, &comment_id, &body.content)?;
    Ok(Json(json!({ "success": true, "comment": comment })))
}

/// DELETE /api/post/:post_id/comment/:comment_id
pub async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let comment = state.posts.get_comment(&post_id, &comment_id)?;
    state.gate.require_ownership(&comment.user_id, &user)?;

    state.posts.delete_comment(&post_id, &comment_id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/post/:post_id/comment/:comment_id/like
pub async fn like_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.posts.like_comment(&post_id, &comment_id, &user.id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/post/:post_id/comment/:comment_id/unlike
pub async fn unlike_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state.posts.unlike_comment(&post_id, &comment_id, &user.id)?;
    Ok(Json(json!({ "success": true })))
}
