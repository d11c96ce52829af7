// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Third-party identity verification.
//!
//! Each provider turns an inbound credential into an [`IdentityClaim`].
//! [`IdentityVerifiers::verify`] dispatches on the [`Credential`] variant
//! so sign-in orchestration is written once for all providers.

pub mod apple;
pub mod facebook;
pub mod google;

pub use apple::AppleVerifier;
pub use facebook::FacebookVerifier;
pub use google::GoogleVerifier;

use crate::config::Config;
use crate::models::AuthProvider;
use validator::ValidateEmail;

/// Domain for synthesized addresses of accounts without an email.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "vireal.com";

/// Longest handle prefix kept before the numeric suffix.
pub const HANDLE_SEED_MAX_LEN: usize = 16;

const APPLE_DEFAULT_DISPLAY_NAME: &str = "Apple User";

/// A provider-issued credential as received from the client.
#[derive(Debug, Clone)]
pub enum Credential {
    /// ID token, or an authorization code to exchange for one
    Google(String),
    /// Graph API user access token
    Facebook(String),
    /// Sign in with Apple identity token
    Apple(String),
}

impl Credential {
    pub fn provider(&self) -> AuthProvider {
        match self {
            Credential::Google(_) => AuthProvider::Google,
            Credential::Facebook(_) => AuthProvider::Facebook,
            Credential::Apple(_) => AuthProvider::Apple,
        }
    }
}

/// Verified result of a third-party credential check.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaim {
    pub provider: AuthProvider,
    /// Stable provider user ID
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid {provider} credential: {reason}")]
    InvalidCredential {
        provider: AuthProvider,
        reason: String,
    },
    #[error("{provider} account has no email")]
    MissingEmail { provider: AuthProvider },
    #[error("{provider} account email is not a valid address")]
    InvalidEmail { provider: AuthProvider },
}

impl IdentityError {
    pub(crate) fn invalid(provider: AuthProvider, reason: impl Into<String>) -> Self {
        IdentityError::InvalidCredential {
            provider,
            reason: reason.into(),
        }
    }
}

impl IdentityClaim {
    /// Lower-case email the user record is keyed on.
    ///
    /// Google accounts must have one. Facebook and Apple accounts without
    /// an email get a deterministic placeholder built from the subject, so
    /// repeated sign-ins resolve to the same user.
    pub fn resolved_email(&self) -> Result<String, IdentityError> {
        let email = match self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => email.to_lowercase(),
            None => match self.provider {
                AuthProvider::Google => {
                    return Err(IdentityError::MissingEmail {
                        provider: self.provider,
                    })
                }
                AuthProvider::Facebook | AuthProvider::Apple => format!(
                    "{}_{}@{}",
                    self.provider.as_str(),
                    self.subject,
                    PLACEHOLDER_EMAIL_DOMAIN
                )
                .to_lowercase(),
            },
        };

        // Provider data is checked here so a bad address never reaches the store
        if !email.validate_email() {
            return Err(IdentityError::InvalidEmail {
                provider: self.provider,
            });
        }
        Ok(email)
    }

    /// Display name for a new user record.
    pub fn display_name_or_default(&self, email: &str) -> String {
        if let Some(name) = self
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }

        match self.provider {
            AuthProvider::Apple => APPLE_DEFAULT_DISPLAY_NAME.to_string(),
            AuthProvider::Google | AuthProvider::Facebook => email_local_part(email).to_string(),
        }
    }

    /// Handle prefix: `[a-z0-9]` only, at most [`HANDLE_SEED_MAX_LEN`] chars.
    ///
    /// Google handles come from the email; Facebook and Apple handles come
    /// from the display name.
    pub fn handle_seed(&self, email: &str) -> String {
        let source = match self.provider {
            AuthProvider::Google => email_local_part(email).to_string(),
            AuthProvider::Facebook | AuthProvider::Apple => self.display_name_or_default(email),
        };

        source
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .take(HANDLE_SEED_MAX_LEN)
            .collect()
    }
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// One verifier per provider.
pub struct IdentityVerifiers {
    pub google: GoogleVerifier,
    pub facebook: FacebookVerifier,
    pub apple: AppleVerifier,
}

impl IdentityVerifiers {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            google: GoogleVerifier::new(config)?,
            facebook: FacebookVerifier::new(config)?,
            apple: AppleVerifier,
        })
    }

    pub async fn verify(&self, credential: &Credential) -> Result<IdentityClaim, IdentityError> {
        let claim = match credential {
            Credential::Google(token) => self.google.verify(token).await,
            Credential::Facebook(token) => self.facebook.verify(token).await,
            Credential::Apple(token) => self.apple.verify(token),
        }?;

        tracing::debug!(
            provider = %claim.provider,
            subject = %claim.subject,
            has_email = claim.email.is_some(),
            "Identity verified"
        );
        Ok(claim)
    }
}
