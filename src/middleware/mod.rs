// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, authorization, error details, headers).

pub mod auth;
pub mod errors;
pub mod roles;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use roles::{require_roles, RequiredRoles};
