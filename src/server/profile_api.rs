//! Own-profile handlers: self view, pending requests, personal-data
//! edits and the home feed.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::{Error, Result};
use crate::identity::{apply_personal_edit, ProfileView, UserCard};
use crate::server::user_api::PageQuery;
use crate::server::AppState;

/// GET /api/profile
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let record = state.users.find_by_id(&user.id)?;
    Ok(Json(json!({
        "success": true,
        "profile": ProfileView::from(&record),
    })))
}

/// GET /api/profile/friend-requests
///
/// Cards for everyone with an open inbound request toward the caller.
pub async fn friend_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let record = state.users.find_by_id(&user.id)?;
    let requesters: Vec<UserCard> = record
        .pending_friend_requests
        .iter()
        .filter_map(|id| state.users.get(id))
        .map(|u| UserCard::from(&u))
        .collect();
    Ok(Json(json!({ "success": true, "requests": requesters })))
}

/// PUT /api/profile/personal-data
///
/// The body arrives as a raw JSON object so forbidden keys can be
/// rejected instead of silently ignored.
pub async fn edit_personal_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let edit = body
        .as_object()
        .ok_or_else(|| Error::InvalidInput("expected a JSON object".into()))?;

    let updated = state.users.with_transaction(|txn| {
        let mut record = txn.fetch(&user.id)?;
        apply_personal_edit(&mut record, edit)?;
        txn.stage(record.clone());
        Ok(record)
    })?;

    Ok(Json(json!({
        "success": true,
        "profile": ProfileView::from(&updated),
    })))
}

/// GET /api/profile/feed?page=&limit=
pub async fn feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let (posts, pagination) = state.posts.feed_page(
        &user.id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.config.page_size),
    )?;
    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "pagination": pagination,
    })))
}
