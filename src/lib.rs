// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vireal auth: session service for the Vireal social app.
//!
//! Verifies Google, Facebook and Apple sign-in credentials, creates users
//! on first sign-in, and runs the access/refresh token session lifecycle.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{IdentityVerifiers, TokenService, UserDirectory};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: UserDirectory,
    pub tokens: TokenService,
    pub identity: IdentityVerifiers,
}
