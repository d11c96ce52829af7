// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error detail exposure for non-production deployments.

use crate::error::ErrorResponse;
use axum::{extract::Request, middleware::Next, response::IntoResponse, response::Response, Json};

/// Rewrite error bodies to include the diagnostic `error` field.
///
/// Only installed when not running in production.
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let Some(full) = response
        .extensions()
        .get::<ErrorResponse>()
        .filter(|full| full.error.is_some())
        .cloned()
    else {
        return response;
    };

    let (mut parts, _body) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    let rebuilt = Json(full).into_response();
    let (rebuilt_parts, body) = rebuilt.into_parts();
    parts.headers.extend(rebuilt_parts.headers);

    Response::from_parts(parts, body)
}
