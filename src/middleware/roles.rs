// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Community-role authorization. Runs after [`require_auth`].
//!
//! ```ignore
//! let moderation = Router::new()
//!     .route("/reports", get(list_reports))
//!     .route_layer(middleware::from_fn_with_state(
//!         (state.clone(), RequiredRoles::new(["moderator", "admin"])),
//!         require_roles,
//!     ))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
//! ```
//!
//! [`require_auth`]: crate::middleware::require_auth

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Roles of which the caller must hold at least one in some community.
#[derive(Debug, Clone)]
pub struct RequiredRoles(Arc<[String]>);

impl RequiredRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }
}

pub async fn require_roles(
    State((state, roles)): State<(Arc<AppState>, RequiredRoles)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AppError::AuthRequired)?;

    let user = state
        .users
        .get(&auth_user.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    if !user.has_any_role(&roles.0) {
        tracing::debug!(user_id = %user.id, "Caller lacks required community role");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
