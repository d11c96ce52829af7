// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process user store for local development and tests.

use crate::db::{StoreError, UserStore};
use crate::models::{RefreshTokenRecord, User};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

/// DashMap-backed [`UserStore`].
///
/// Index maps are always locked in the order emails, then handles.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    emails: DashMap<String, String>,
    handles: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Apply `mutate` under the document lock; it returns whether it
    /// changed anything. `None` if the user does not exist.
    fn modify<F>(&self, id: &str, mutate: F) -> Option<(User, bool)>
    where
        F: FnOnce(&mut User) -> bool,
    {
        let mut user = self.users.get_mut(id)?;
        let changed = mutate(&mut user);
        if changed {
            user.revision += 1;
        }
        Some((user.clone(), changed))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.emails.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_user(&id).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let Entry::Vacant(email_slot) = self.emails.entry(user.email.clone()) else {
            return Err(StoreError::DuplicateEmail);
        };
        let Entry::Vacant(handle_slot) = self.handles.entry(user.username.clone()) else {
            return Err(StoreError::DuplicateHandle);
        };
        if self.users.contains_key(&user.id) {
            return Err(StoreError::InvalidDocument(format!(
                "user id {} already in use",
                user.id
            )));
        }

        self.users.insert(user.id.clone(), user.clone());
        handle_slot.insert(user.id.clone());
        email_slot.insert(user.id.clone());
        Ok(())
    }

    async fn set_last_login(&self, id: &str, at: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .modify(id, |user| {
                user.last_login = at.to_string();
                true
            })
            .map(|(user, _)| user))
    }

    async fn push_refresh_token(
        &self,
        id: &str,
        record: RefreshTokenRecord,
    ) -> Result<bool, StoreError> {
        Ok(self
            .modify(id, |user| {
                user.add_refresh_token(record);
                true
            })
            .is_some())
    }

    async fn pull_refresh_token(&self, id: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .modify(id, |user| user.remove_refresh_token(token))
            .is_some_and(|(_, removed)| removed))
    }

    async fn clear_refresh_tokens(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .modify(id, |user| {
                let had_any = !user.refresh_tokens.is_empty();
                user.refresh_tokens.clear();
                had_any
            })
            .is_some())
    }

    async fn replace_refresh_token(
        &self,
        id: &str,
        old: &str,
        new: RefreshTokenRecord,
    ) -> Result<bool, StoreError> {
        Ok(self
            .modify(id, |user| user.replace_refresh_token(old, new))
            .is_some_and(|(_, replaced)| replaced))
    }
}
