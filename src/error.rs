// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every error leaves the service as `{success: false, message, error?}`.
//! The `error` detail is carried on the response as an [`ErrorResponse`]
//! extension and only copied into the body by
//! [`crate::middleware::errors::expose_error_details`], which is installed
//! outside production.

use crate::db::StoreError;
use crate::models::AuthProvider;
use crate::services::identity::IdentityError;
use crate::services::tokens::TokenError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    MissingField(&'static str),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{provider} account email is required")]
    MissingEmail { provider: AuthProvider },

    #[error("{provider} account email is invalid")]
    InvalidEmail { provider: AuthProvider },

    #[error("Invalid account data")]
    Validation(String),

    #[error("Invalid {provider} token")]
    InvalidCredential {
        provider: AuthProvider,
        reason: String,
    },

    #[error("Authorization token is required")]
    AuthRequired,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken(String),

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("An account with this email is being created, please retry")]
    DuplicateUser,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingField(_)
            | AppError::BadRequest(_)
            | AppError::MissingEmail { .. }
            | AppError::InvalidEmail { .. }
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredential { .. }
            | AppError::AuthRequired
            | AppError::TokenExpired
            | AppError::InvalidToken(_)
            | AppError::InvalidRefreshToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateUser => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message. Server faults never reveal their cause here.
    fn message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Diagnostic detail for non-production responses.
    fn detail(&self) -> Option<String> {
        match self {
            AppError::InvalidCredential { reason, .. }
            | AppError::InvalidToken(reason)
            | AppError::InvalidRefreshToken(reason)
            | AppError::Validation(reason) => Some(reason.clone()),
            AppError::Database(msg) => Some(msg.clone()),
            AppError::Internal(err) => Some(format!("{err:#}")),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            message: self.message(),
            error: None,
        };
        let full = ErrorResponse {
            error: self.detail(),
            ..body.clone()
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(full);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid(reason) => AppError::InvalidToken(reason),
            TokenError::Signing(reason) => {
                AppError::Internal(anyhow::anyhow!("token signing failed: {reason}"))
            }
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredential { provider, reason } => {
                AppError::InvalidCredential { provider, reason }
            }
            IdentityError::MissingEmail { provider } => AppError::MissingEmail { provider },
            IdentityError::InvalidEmail { provider } => AppError::InvalidEmail { provider },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateUser,
            StoreError::DuplicateHandle => {
                AppError::Internal(anyhow::anyhow!("username collision was not resolved"))
            }
            StoreError::Validation(msg) => AppError::Validation(msg),
            StoreError::InvalidDocument(msg) => {
                AppError::Internal(anyhow::anyhow!("invalid user document: {msg}"))
            }
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
