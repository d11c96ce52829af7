// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.
//!
//! [`User`] is the stored document. It carries the password hash, the
//! active refresh tokens and an internal revision counter, so it is never
//! serialized into a response; [`UserView`] is the only external shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub const DEFAULT_AVATAR: &str = "https://cdn.vireal.com/default-avatar.png";
pub const DEFAULT_BANNER: &str = "https://cdn.vireal.com/default-banner.jpg";

/// Maximum live sessions per user. The oldest is evicted beyond this.
pub const MAX_ACTIVE_SESSIONS: usize = 10;

/// Third-party identity provider a user signed up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Facebook,
    Apple,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::Facebook => "facebook",
            AuthProvider::Apple => "apple",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthProvider::Google => "Google",
            AuthProvider::Facebook => "Facebook",
            AuthProvider::Apple => "Apple",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub theme: Theme,
    pub notifications_enabled: bool,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Auto,
            notifications_enabled: true,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMembership {
    pub organization_id: String,
    pub rank: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityMembership {
    pub community_id: String,
    /// Role within the community (e.g. `member`, `moderator`, `admin`)
    pub role: String,
    pub joined_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// One live session grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub token: String,
    /// Originating device (request User-Agent)
    pub device: String,
    pub created_at: String,
}

/// User document stored in the user collection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Document ID
    pub id: String,
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    /// Always lower-case
    #[validate(email)]
    pub email: String,
    pub display_name: Option<String>,
    /// Set at creation, never changed afterwards
    pub auth_provider: AuthProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub avatar: String,
    pub banner: String,
    #[validate(length(max = 500))]
    pub bio: String,

    // ─── Progression ─────────────────────────────────────────────
    #[validate(range(min = 1, max = 100))]
    pub level: u32,
    pub xp: u64,
    #[serde(rename = "nextLevelXP")]
    pub next_level_xp: u64,

    // ─── Social ──────────────────────────────────────────────────
    pub followers: u64,
    pub following: u64,

    // ─── References ──────────────────────────────────────────────
    #[serde(default)]
    pub title_ids: Vec<String>,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub clan_id: Option<String>,
    #[serde(default)]
    pub organization_memberships: Vec<OrganizationMembership>,
    #[serde(default)]
    pub community_memberships: Vec<CommunityMembership>,
    #[serde(default)]
    pub post_ids: Vec<String>,
    #[serde(default)]
    pub notification_ids: Vec<String>,

    pub settings: UserSettings,
    #[serde(default = "default_true")]
    pub is_active: bool,

    // ─── Sessions ────────────────────────────────────────────────
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshTokenRecord>,

    pub created_at: String,
    pub last_login: String,
    /// Bumped on every write
    #[serde(default)]
    pub revision: u64,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn has_refresh_token(&self, token: &str) -> bool {
        self.refresh_tokens.iter().any(|rt| rt.token == token)
    }

    /// Append a session, evicting the oldest ones past [`MAX_ACTIVE_SESSIONS`].
    pub fn add_refresh_token(&mut self, record: RefreshTokenRecord) {
        self.refresh_tokens.push(record);
        if self.refresh_tokens.len() > MAX_ACTIVE_SESSIONS {
            let excess = self.refresh_tokens.len() - MAX_ACTIVE_SESSIONS;
            self.refresh_tokens.drain(..excess);
        }
    }

    /// Returns whether a record was removed.
    pub fn remove_refresh_token(&mut self, token: &str) -> bool {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|rt| rt.token != token);
        self.refresh_tokens.len() != before
    }

    /// Swap `old` for `new` only if `old` is still live.
    pub fn replace_refresh_token(&mut self, old: &str, new: RefreshTokenRecord) -> bool {
        if !self.remove_refresh_token(old) {
            return false;
        }
        self.add_refresh_token(new);
        true
    }

    /// Whether any active community membership carries one of `roles`.
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        self.community_memberships
            .iter()
            .filter(|m| m.is_active)
            .any(|m| roles.iter().any(|r| r == &m.role))
    }

    /// The externally visible projection of this user.
    pub fn to_view(&self) -> UserView {
        UserView::from(self)
    }
}

/// User as returned by the API. Has no password hash, sessions or revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub auth_provider: AuthProvider,
    pub avatar: String,
    pub banner: String,
    pub bio: String,
    pub level: u32,
    pub xp: u64,
    #[serde(rename = "nextLevelXP")]
    pub next_level_xp: u64,
    pub followers: u64,
    pub following: u64,
    pub title_ids: Vec<String>,
    pub role_ids: Vec<String>,
    pub clan_id: Option<String>,
    pub organization_memberships: Vec<OrganizationMembership>,
    pub community_memberships: Vec<CommunityMembership>,
    pub post_ids: Vec<String>,
    pub notification_ids: Vec<String>,
    pub settings: UserSettings,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            auth_provider: user.auth_provider,
            avatar: user.avatar.clone(),
            banner: user.banner.clone(),
            bio: user.bio.clone(),
            level: user.level,
            xp: user.xp,
            next_level_xp: user.next_level_xp,
            followers: user.followers,
            following: user.following,
            title_ids: user.title_ids.clone(),
            role_ids: user.role_ids.clone(),
            clan_id: user.clan_id.clone(),
            organization_memberships: user.organization_memberships.clone(),
            community_memberships: user.community_memberships.clone(),
            post_ids: user.post_ids.clone(),
            notification_ids: user.notification_ids.clone(),
            settings: user.settings.clone(),
            is_active: user.is_active,
            created_at: user.created_at.clone(),
            last_login: user.last_login.clone(),
        }
    }
}
