// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`UserStore`].
//!
//! Layout:
//! - `users/{id}`: the user document
//! - `user_emails/{email}`: unique email index, points at the user ID
//! - `user_handles/{username}`: unique handle index, points at the user ID
//!
//! A new user and both index documents are written in one transaction
//! with an `Exists(false)` precondition on each, so a concurrent first
//! login for the same email or handle fails cleanly instead of producing
//! a second record.

use crate::db::{collections, StoreError, UserStore};
use crate::models::{RefreshTokenRecord, User};
use async_trait::async_trait;
use firestore::{FirestoreConsistencySelector, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};

/// Index document body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    user_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

fn backend(context: &'static str) -> impl Fn(firestore::errors::FirestoreError) -> StoreError {
    move |e| StoreError::Backend(format!("{context}: {e}"))
}

/// Index document IDs may not contain `/`.
fn index_key(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(backend("failed to connect to Firestore"))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Firestore client for the emulator, using a dummy bearer token.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJlbXVsYXRvciJ9."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(backend("failed to connect to Firestore Emulator"))?;

        tracing::info!(project = project_id, "Connected to Firestore (Emulator)");

        Ok(Self { client })
    }

    async fn index_exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let entry: Option<IndexEntry> = self
            .client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&index_key(key))
            .await
            .map_err(backend("index lookup failed"))?;
        Ok(entry.is_some())
    }

    /// Read-modify-write of one user document inside a transaction.
    ///
    /// `mutate` returns whether it changed the user; unchanged users are
    /// not written. Returns `None` if the user does not exist.
    async fn modify_user<F>(&self, id: &str, mutate: F) -> Result<Option<(User, bool)>, StoreError>
    where
        F: FnOnce(&mut User) -> bool + Send,
    {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(backend("failed to begin transaction"))?;

        // Reads through this handle register the document for conflict detection
        let reader = self.client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );
        let current: Option<User> = reader
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(backend("failed to read user in transaction"))?;

        let Some(mut user) = current else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        if !mutate(&mut user) {
            let _ = transaction.rollback().await;
            return Ok(Some((user, false)));
        }
        user.revision += 1;

        self.client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(backend("failed to add user to transaction"))?;

        transaction
            .commit()
            .await
            .map_err(backend("transaction commit failed"))?;

        tracing::debug!(user_id = id, revision = user.revision, "User updated");

        Ok(Some((user, true)))
    }
}

#[async_trait]
impl UserStore for FirestoreDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(backend("failed to read user"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let entry: Option<IndexEntry> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&index_key(email))
            .await
            .map_err(backend("email lookup failed"))?;

        match entry {
            Some(entry) => self.get_user(&entry.user_id).await,
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let entry = IndexEntry {
            user_id: user.id.clone(),
        };

        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(backend("failed to begin transaction"))?;

        let writes = [
            (collections::USER_EMAILS, index_key(&user.email)),
            (collections::USER_HANDLES, index_key(&user.username)),
        ];
        for (collection, key) in &writes {
            self.client
                .fluent()
                .update()
                .in_col(collection)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(key)
                .object(&entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;

        if let Err(e) = transaction.commit().await {
            // A failed precondition does not say which index clashed
            if self.index_exists(collections::USER_EMAILS, &user.email).await? {
                return Err(StoreError::DuplicateEmail);
            }
            if self
                .index_exists(collections::USER_HANDLES, &user.username)
                .await?
            {
                return Err(StoreError::DuplicateHandle);
            }
            return Err(StoreError::Backend(format!("failed to create user: {e}")));
        }

        tracing::debug!(user_id = %user.id, "User documents written");
        Ok(())
    }

    async fn set_last_login(&self, id: &str, at: &str) -> Result<Option<User>, StoreError> {
        let at = at.to_string();
        Ok(self
            .modify_user(id, move |user| {
                user.last_login = at;
                true
            })
            .await?
            .map(|(user, _)| user))
    }

    async fn push_refresh_token(
        &self,
        id: &str,
        record: RefreshTokenRecord,
    ) -> Result<bool, StoreError> {
        Ok(self
            .modify_user(id, move |user| {
                user.add_refresh_token(record);
                true
            })
            .await?
            .is_some())
    }

    async fn pull_refresh_token(&self, id: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .modify_user(id, |user| user.remove_refresh_token(token))
            .await?
            .is_some_and(|(_, removed)| removed))
    }

    async fn clear_refresh_tokens(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .modify_user(id, |user| {
                let had_any = !user.refresh_tokens.is_empty();
                user.refresh_tokens.clear();
                had_any
            })
            .await?
            .is_some())
    }

    async fn replace_refresh_token(
        &self,
        id: &str,
        old: &str,
        new: RefreshTokenRecord,
    ) -> Result<bool, StoreError> {
        Ok(self
            .modify_user(id, move |user| user.replace_refresh_token(old, new))
            .await?
            .is_some_and(|(_, replaced)| replaced))
    }
}
