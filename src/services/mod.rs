// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod tokens;
pub mod user_directory;

pub use identity::{Credential, IdentityClaim, IdentityError, IdentityVerifiers};
pub use tokens::{TokenError, TokenPair, TokenService};
pub use user_directory::UserDirectory;
