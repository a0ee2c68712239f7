//! Account lifecycle handlers.
//!
//! Registration, activation, login/logout and the credential-change
//! routes. The heavy lifting lives in
//! [`AccountManager`](crate::identity::accounts::AccountManager); these
//! handlers translate HTTP in and out.
//!
//! Activation tokens, reset tokens and confirmation codes appear in the
//! response body because mail transport is handled outside this service.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::identity::NewUser;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordBody {
    pub token: String,
    pub new_password: String,
    #[serde(default)]
    pub logout_everywhere: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditPasswordBody {
    pub old_password: String,
    pub new_password: String,
    #[serde(default)]
    pub logout_everywhere: bool,
}

#[derive(Debug, Deserialize)]
pub struct EmailChangeRequestBody {
    pub password: String,
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailChangeBody {
    pub code: String,
    pub new_email: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> Result<impl IntoResponse> {
    let (user_id, activation_token) = state.accounts.register(body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "id": user_id,
            "activation_token": activation_token,
        })),
    ))
}

/// GET /api/auth/activation/:token
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = state.accounts.activate(&token)?;
    Ok(Json(json!({ "success": true, "id": user_id })))
}

/// POST /api/auth/resend-activation
pub async fn resend_activation(
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> Result<impl IntoResponse> {
    let activation_token = state.accounts.resend_activation(&body.email)?;
    Ok(Json(json!({
        "success": true,
        "activation_token": activation_token,
    })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse> {
    let (user_id, token) = state.accounts.login(&body.email, &body.password)?;
    Ok(Json(json!({
        "success": true,
        "id": user_id,
        "token": token,
    })))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let token = state.bearer(&headers)?;
    state.accounts.logout(&user.id, &token)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> Result<impl IntoResponse> {
    let reset_token = state.accounts.forgot_password(&body.email)?;
    Ok(Json(json!({
        "success": true,
        "reset_token": reset_token,
    })))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<impl IntoResponse> {
    state
        .accounts
        .reset_password(&body.token, &body.new_password, body.logout_everywhere)?;
    Ok(Json(json!({ "success": true })))
}

/// PUT /api/auth/edit-password
pub async fn edit_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EditPasswordBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let token = state.bearer(&headers)?;
    state.accounts.edit_password(
        &user.id,
        &body.old_password,
        &body.new_password,
        body.logout_everywhere,
        &token,
    )?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/auth/request-email-change
pub async fn request_email_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EmailChangeRequestBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    let code = state
        .accounts
        .request_email_change(&user.id, &body.password, &body.new_email)?;
    Ok(Json(json!({ "success": true, "code": code })))
}

/// PUT /api/auth/change-email
pub async fn change_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EmailChangeBody>,
) -> Result<impl IntoResponse> {
    let user = state.authenticate(&headers)?;
    state
        .accounts
        .change_email(&user.id, &body.code, &body.new_email)?;
    Ok(Json(json!({ "success": true })))
}
