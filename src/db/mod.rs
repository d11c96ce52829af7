// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`UserStore`] is the only persistence seam. [`FirestoreDb`] backs it in
//! production; [`MemoryStore`] is used for local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::models::{RefreshTokenRecord, User};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Unique email index, keyed by lower-case email
    pub const USER_EMAILS: &str = "user_emails";
    /// Unique handle index, keyed by username
    pub const USER_HANDLES: &str = "user_handles";
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("a user with this username already exists")]
    DuplicateHandle,
    /// The user record failed field validation before being written.
    #[error("user failed validation: {0}")]
    Validation(String),
    #[error("invalid user document: {0}")]
    InvalidDocument(String),
    #[error("{0}")]
    Backend(String),
}

/// User document persistence.
///
/// Mutations are applied to a single user document atomically and bump
/// its `revision`. Methods that target a user by ID report a missing user
/// through their return value rather than an error.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user, enforcing unique email then unique username.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Returns the updated user, or `None` if it does not exist.
    async fn set_last_login(&self, id: &str, at: &str) -> Result<Option<User>, StoreError>;

    /// Returns false if the user does not exist.
    async fn push_refresh_token(
        &self,
        id: &str,
        record: RefreshTokenRecord,
    ) -> Result<bool, StoreError>;

    /// Returns whether a matching record was removed.
    async fn pull_refresh_token(&self, id: &str, token: &str) -> Result<bool, StoreError>;

    /// Returns false if the user does not exist.
    async fn clear_refresh_tokens(&self, id: &str) -> Result<bool, StoreError>;

    /// Swap `old` for `new` in one write, only if `old` is still live.
    async fn replace_refresh_token(
        &self,
        id: &str,
        old: &str,
        new: RefreshTokenRecord,
    ) -> Result<bool, StoreError>;
}
