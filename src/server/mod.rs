//! HTTP surface.
//!
//! One shared [`AppState`] holds the stores and the domain services;
//! handler modules are grouped per resource the way routes are grouped.
//! Handlers return `Result<impl IntoResponse>` and rely on the
//! [`IntoResponse`] impl on [`Error`] for uniform JSON error bodies.

pub mod auth_api;
pub mod post_api;
pub mod profile_api;
pub mod user_api;

use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::auth::{AuthGate, AuthenticatedUser};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::friends::FriendshipGraph;
use crate::identity::accounts::AccountManager;
use crate::posts::PostService;
use crate::session::SessionManager;
use crate::store::{CommentStore, PostStore, UserStore};

/// Shared server state: every store and service, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub friends: Arc<FriendshipGraph>,
    pub sessions: Arc<SessionManager>,
    pub accounts: Arc<AccountManager>,
    pub gate: Arc<AuthGate>,
    pub posts: Arc<PostService>,
    pub config: Config,
}

impl AppState {
    /// Wire up all services over fresh stores.
    pub fn new(config: Config) -> Self {
        let users = Arc::new(UserStore::new());
        let sessions = Arc::new(SessionManager::new(
            users.clone(),
            &config.secret,
            config.session_ttl_secs,
        ));
        Self {
            friends: Arc::new(FriendshipGraph::new(users.clone())),
            accounts: Arc::new(AccountManager::new(users.clone(), sessions.clone())),
            gate: Arc::new(AuthGate::new(sessions.clone())),
            posts: Arc::new(PostService::new(
                users.clone(),
                Arc::new(PostStore::new()),
                Arc::new(CommentStore::new()),
            )),
            users,
            sessions,
            config,
        }
    }

    /// Authenticate a request from its headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        self.gate.authenticate(header)
    }

    /// The raw bearer token of a request, for logout-style operations
    /// that act on the presented credential itself.
    pub fn bearer(&self, headers: &HeaderMap) -> Result<String> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(crate::auth::bearer_token)
            .map(str::to_string)
            .ok_or(Error::Unauthenticated)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "success": false,
            "type": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Account lifecycle
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/activation/:token", get(auth_api::activate))
        .route(
            "/api/auth/resend-activation",
            post(auth_api::resend_activation),
        )
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/api/auth/forgot-password", post(auth_api::forgot_password))
        .route("/api/auth/reset-password", post(auth_api::reset_password))
        .route("/api/auth/edit-password", put(auth_api::edit_password))
        .route(
            "/api/auth/request-email-change",
            post(auth_api::request_email_change),
        )
        .route("/api/auth/change-email", put(auth_api::change_email))
        // Users and friendships
        .route("/api/user/search", get(user_api::search))
        .route("/api/user/:id", get(user_api::get_user))
        .route("/api/user/:id/add-friend", post(user_api::add_friend))
        .route("/api/user/:id/accept", post(user_api::accept_request))
        .route("/api/user/:id/deny", post(user_api::deny_request))
        .route("/api/user/:id/cancel", post(user_api::cancel_request))
        .route("/api/user/:id/unfriend", post(user_api::unfriend))
        .route("/api/user/:id/posts", get(user_api::user_posts))
        // Own profile
        .route("/api/profile", get(profile_api::me))
        .route(
            "/api/profile/friend-requests",
            get(profile_api::friend_requests),
        )
        .route(
            "/api/profile/personal-data",
            put(profile_api::edit_personal_data),
        )
        .route("/api/profile/feed", get(profile_api::feed))
        // Posts and comments
        .route("/api/post", post(post_api::create_post))
        .route(
            "/api/post/:id",
            get(post_api::get_post)
                .put(post_api::edit_post)
                .delete(post_api::delete_post),
        )
        .route("/api/post/:id/like", post(post_api::like_post))
        .route("/api/post/:id/unlike", post(post_api::unlike_post))
        .route("/api/post/:id/comments", get(post_api::list_comments))
        .route("/api/post/:id/comment", post(post_api::add_comment))
        .route(
            "/api/post/:post_id/comment/:comment_id",
            put(post_api::edit_comment).delete(post_api::delete_comment),
        )
        .route(
            "/api/post/:post_id/comment/:comment_id/like",
            post(post_api::like_comment),
        )
        .route(
            "/api/post/:post_id/comment/:comment_id/unlike",
            post(post_api::unlike_comment),
        )
        // Operational
        .route("/health", get(health))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ripple",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// TESTS
// ============================================================================
