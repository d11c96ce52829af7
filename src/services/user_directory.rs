// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User directory: resolves verified identities to user records and
//! manages each user's set of live refresh tokens.

use crate::db::{StoreError, UserStore};
use crate::models::user::{DEFAULT_AVATAR, DEFAULT_BANNER};
use crate::models::{RefreshTokenRecord, User, UserSettings, UserView};
use crate::services::identity::IdentityClaim;
use crate::time_utils::now_rfc3339;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Insert attempts before a username collision is given up on.
pub const HANDLE_ATTEMPTS: usize = 5;

const MAX_HANDLE_LEN: usize = 20;
const STARTING_NEXT_LEVEL_XP: u64 = 1000;

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.store.get_user(id).await
    }

    /// Existing user for `email`, or a new one created from `claim`.
    ///
    /// An existing user is returned as stored: a later sign-in never
    /// changes its provider, profile or settings.
    pub async fn find_or_create(
        &self,
        claim: &IdentityClaim,
        email: &str,
    ) -> Result<User, StoreError> {
        if let Some(user) = self.store.find_user_by_email(email).await? {
            return Ok(user);
        }

        let seed = claim.handle_seed(email);
        let now = now_rfc3339();

        for attempt in 1..=HANDLE_ATTEMPTS {
            let user = new_user(claim, email, generate_handle(&seed), &now);
            user.validate()
                .map_err(|e| StoreError::Validation(e.to_string()))?;

            match self.store.insert_user(&user).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %user.id,
                        provider = %user.auth_provider,
                        "New user registered"
                    );
                    return Ok(user);
                }
                Err(StoreError::DuplicateHandle) => {
                    tracing::debug!(attempt, username = %user.username, "Username taken");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(seed = %seed, "Could not find a free username");
        Err(StoreError::DuplicateHandle)
    }

    /// Record a successful sign-in.
    pub async fn touch_login(&self, user: &User) -> Result<User, StoreError> {
        self.store
            .set_last_login(&user.id, &now_rfc3339())
            .await?
            .ok_or_else(|| vanished(&user.id))
    }

    pub async fn add_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        device: &str,
    ) -> Result<(), StoreError> {
        if self
            .store
            .push_refresh_token(user_id, refresh_record(token, device))
            .await?
        {
            Ok(())
        } else {
            Err(vanished(user_id))
        }
    }

    /// Removing a token that is already gone is not an error.
    pub async fn remove_refresh_token(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        let removed = self.store.pull_refresh_token(user_id, token).await?;
        tracing::debug!(user_id, removed, "Refresh token revoked");
        Ok(())
    }

    pub async fn remove_all_refresh_tokens(&self, user_id: &str) -> Result<(), StoreError> {
        self.store.clear_refresh_tokens(user_id).await?;
        tracing::info!(user_id, "All refresh tokens revoked");
        Ok(())
    }

    /// Atomically replace `old` with `new`. Returns false if `old` was no
    /// longer live, in which case nothing changed.
    pub async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old: &str,
        new: &str,
        device: &str,
    ) -> Result<bool, StoreError> {
        self.store
            .replace_refresh_token(user_id, old, refresh_record(new, device))
            .await
    }

    /// The only way a user leaves the service.
    pub fn to_safe_view(&self, user: &User) -> UserView {
        user.to_view()
    }
}

fn vanished(user_id: &str) -> StoreError {
    StoreError::Backend(format!("user {user_id} disappeared during update"))
}

fn refresh_record(token: &str, device: &str) -> RefreshTokenRecord {
    RefreshTokenRecord {
        token: token.to_string(),
        device: device.to_string(),
        created_at: now_rfc3339(),
    }
}

/// `seed` followed by a random number in 1000..=9999.
pub fn generate_handle(seed: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    let mut handle = format!("{seed}{suffix}");
    handle.truncate(MAX_HANDLE_LEN);
    handle
}

/// A fresh user record for a first sign-in.
pub fn new_user(claim: &IdentityClaim, email: &str, username: String, now: &str) -> User {
    User {
        id: Uuid::new_v4().to_string(),
        username,
        email: email.to_string(),
        display_name: Some(claim.display_name_or_default(email)),
        auth_provider: claim.provider,
        password_hash: None,
        avatar: claim
            .avatar_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
        banner: DEFAULT_BANNER.to_string(),
        bio: String::new(),
        level: 1,
        xp: 0,
        next_level_xp: STARTING_NEXT_LEVEL_XP,
        followers: 0,
        following: 0,
        title_ids: Vec::new(),
        role_ids: Vec::new(),
        clan_id: None,
        organization_memberships: Vec::new(),
        community_memberships: Vec::new(),
        post_ids: Vec::new(),
        notification_ids: Vec::new(),
        settings: UserSettings::default(),
        is_active: true,
        refresh_tokens: Vec::new(),
        created_at: now.to_string(),
        last_login: now.to_string(),
        revision: 0,
    }
}
