// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: provider sign-in, token refresh, sign-out.

use crate::error::{AppError, Result};
use crate::middleware::auth::{require_auth, AuthUser};
use crate::models::UserView;
use crate::routes::AppJson;
use crate::services::{Credential, TokenError, TokenPair};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Routes mounted under `/api/auth`.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/sign-out", post(sign_out))
        .route("/me", get(get_me))
        .route("/validate-token", get(validate_token))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/google", post(google_sign_in))
        .route("/facebook", post(facebook_sign_in))
        .route("/apple", post(apple_sign_in))
        .route("/refresh-token", post(refresh_token))
        .merge(protected)
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenSignInRequest {
    pub id_token: Option<String>,
    pub user_data: Option<ClientUserData>,
}

/// Profile hints sent by the client alongside the credential.
#[derive(Debug, Default, Deserialize)]
pub struct ClientUserData {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacebookSignInRequest {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutRequest {
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub all_devices: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionData {
    pub user: UserView,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct TokensData {
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: UserView,
}

// ─── Sign-In ─────────────────────────────────────────────────

async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<IdTokenSignInRequest>,
) -> Result<Json<ApiResponse<SessionData>>> {
    let token = required(body.id_token, "Google authentication token is required")?;
    complete_sign_in(
        &state,
        Credential::Google(token),
        body.user_data.and_then(|d| d.name),
        device_label(&headers),
        "Google sign in successful",
    )
    .await
}

async fn facebook_sign_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<FacebookSignInRequest>,
) -> Result<Json<ApiResponse<SessionData>>> {
    let token = required(body.access_token, "Facebook access token is required")?;
    complete_sign_in(
        &state,
        Credential::Facebook(token),
        None,
        device_label(&headers),
        "Facebook sign in successful",
    )
    .await
}

async fn apple_sign_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<IdTokenSignInRequest>,
) -> Result<Json<ApiResponse<SessionData>>> {
    let token = required(body.id_token, "Apple ID token is required")?;
    complete_sign_in(
        &state,
        Credential::Apple(token),
        body.user_data.and_then(|d| d.name),
        device_label(&headers),
        "Apple sign in successful",
    )
    .await
}

/// Verify, resolve or create the user, then open a session on `device`.
async fn complete_sign_in(
    state: &AppState,
    credential: Credential,
    name_override: Option<String>,
    device: &str,
    message: &'static str,
) -> Result<Json<ApiResponse<SessionData>>> {
    let mut claim = state.identity.verify(&credential).await?;
    if let Some(name) = name_override.filter(|n| !n.trim().is_empty()) {
        claim.display_name = Some(name);
    }
    let email = claim.resolved_email()?;

    let user = state.users.find_or_create(&claim, &email).await?;
    let user = state.users.touch_login(&user).await?;

    let tokens = state.tokens.issue_pair(&user.id, &user.email)?;
    state
        .users
        .add_refresh_token(&user.id, &tokens.refresh_token, device)
        .await?;

    tracing::info!(user_id = %user.id, provider = %claim.provider, "Sign-in successful");

    Ok(ApiResponse::ok(
        message,
        SessionData {
            user: state.users.to_safe_view(&user),
            tokens,
        },
    ))
}

// ─── Session Maintenance ─────────────────────────────────────

/// Exchange a live refresh token for a new pair, retiring the old token.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<TokensData>>> {
    let presented = required(body.refresh_token, "Refresh token is required")?;

    let claims = state
        .tokens
        .verify_refresh(&presented)
        .map_err(|e| match e {
            TokenError::Expired => AppError::InvalidRefreshToken("refresh token expired".into()),
            TokenError::Invalid(reason) => AppError::InvalidRefreshToken(reason),
            other => other.into(),
        })?;

    let user = state
        .users
        .get(&claims.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::InvalidRefreshToken("user not found or inactive".into()))?;

    if !user.has_refresh_token(&presented) {
        tracing::warn!(user_id = %user.id, "Refresh token not in active set");
        return Err(AppError::InvalidRefreshToken(
            "refresh token is not active".into(),
        ));
    }

    let tokens = state.tokens.issue_pair(&user.id, &user.email)?;
    let rotated = state
        .users
        .rotate_refresh_token(
            &user.id,
            &presented,
            &tokens.refresh_token,
            device_label(&headers),
        )
        .await?;
    if !rotated {
        tracing::warn!(user_id = %user.id, "Refresh token rotated concurrently");
        return Err(AppError::InvalidRefreshToken(
            "refresh token is not active".into(),
        ));
    }

    tracing::debug!(user_id = %user.id, "Refresh token rotated");

    Ok(ApiResponse::ok(
        "Token refreshed successfully",
        TokensData { tokens },
    ))
}

/// Revoke one session, or all of them. Always succeeds.
///
/// The body is optional; an empty body revokes nothing.
async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let request: SignOutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SignOutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Failed to parse the request body as JSON: {e}")))?
    };

    if request.all_devices {
        state.users.remove_all_refresh_tokens(&auth_user.user_id).await?;
    } else if let Some(token) = request.refresh_token.filter(|t| !t.is_empty()) {
        state
            .users
            .remove_refresh_token(&auth_user.user_id, &token)
            .await?;
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Signed out successfully",
    }))
}

// ─── Current User ────────────────────────────────────────────

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserData>>> {
    let user = state
        .users
        .get(&auth_user.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    Ok(ApiResponse::ok(
        "User retrieved successfully",
        UserData {
            user: state.users.to_safe_view(&user),
        },
    ))
}

/// The auth gate has already accepted the token.
async fn validate_token() -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: "Token is valid",
    })
}

// ─── Helpers ─────────────────────────────────────────────────

fn required(value: Option<String>, message: &'static str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(AppError::MissingField(message))
}

fn device_label(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
