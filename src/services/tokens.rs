// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets.
//! Every token carries a `type` claim plus a fixed issuer and audience, and
//! all of them are checked on verification: a correctly signed token of
//! the wrong type is rejected like a forged one.

use crate::config::Config;
use crate::time_utils::now_unix_secs;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const TOKEN_ISSUER: &str = "vireal-app";
pub const TOKEN_AUDIENCE: &str = "vireal-users";

/// Lifetime used when an expiry string has an unknown unit.
const FALLBACK_EXPIRY_SECS: u64 = 900;
const PASSWORD_RESET_TTL_SECS: u64 = 60 * 60;
const EMAIL_VERIFICATION_TTL_SECS: u64 = 24 * 60 * 60;

/// Value of the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
    EmailVerification,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::PasswordReset => "password-reset",
            TokenKind::EmailVerification => "email-verification",
        };
        f.write_str(name)
    }
}

/// Claims common to every token this service signs.
trait TypedClaims {
    fn kind(&self) -> TokenKind;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique per issued refresh token
    pub token_id: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetClaims {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerificationClaims {
    pub user_id: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
}

impl TypedClaims for AccessClaims {
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

impl TypedClaims for RefreshClaims {
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

impl TypedClaims for PasswordResetClaims {
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

impl TypedClaims for EmailVerificationClaims {
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// Access + refresh token pair handed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signs and verifies every token type. Holds the only copies of the keys.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;

        Self {
            access_encoding: EncodingKey::from_secret(&config.access_token_secret),
            access_decoding: DecodingKey::from_secret(&config.access_token_secret),
            refresh_encoding: EncodingKey::from_secret(&config.refresh_token_secret),
            refresh_decoding: DecodingKey::from_secret(&config.refresh_token_secret),
            access_ttl_secs: parse_expiry(&config.access_token_expiry),
            refresh_ttl_secs: parse_expiry(&config.refresh_token_expiry),
            validation,
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    // ─── Session Tokens ──────────────────────────────────────────

    /// Issue a fresh access/refresh pair for a user.
    pub fn issue_pair(&self, user_id: &str, email: &str) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(user_id, email, now_unix_secs())
    }

    fn issue_pair_at(&self, user_id: &str, email: &str, now: u64) -> Result<TokenPair, TokenError> {
        let access = AccessClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            kind: TokenKind::Access,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now,
            exp: now.saturating_add(self.access_ttl_secs),
        };
        let refresh = RefreshClaims {
            user_id: user_id.to_string(),
            kind: TokenKind::Refresh,
            token_id: Uuid::new_v4().to_string(),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now,
            exp: now.saturating_add(self.refresh_ttl_secs),
        };

        Ok(TokenPair {
            access_token: sign(&access, &self.access_encoding)?,
            refresh_token: sign(&refresh, &self.refresh_encoding)?,
            expires_in: self.access_ttl_secs,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, &self.access_decoding, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token, &self.refresh_decoding, TokenKind::Refresh)
    }

    // ─── Single-Purpose Tokens ───────────────────────────────────

    pub fn issue_password_reset(&self, user_id: &str) -> Result<String, TokenError> {
        let now = now_unix_secs();
        let claims = PasswordResetClaims {
            user_id: user_id.to_string(),
            kind: TokenKind::PasswordReset,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now,
            exp: now.saturating_add(PASSWORD_RESET_TTL_SECS),
        };
        sign(&claims, &self.access_encoding)
    }

    pub fn verify_password_reset(&self, token: &str) -> Result<PasswordResetClaims, TokenError> {
        self.verify(token, &self.access_decoding, TokenKind::PasswordReset)
    }

    pub fn issue_email_verification(&self, user_id: &str, email: &str) -> Result<String, TokenError> {
        let now = now_unix_secs();
        let claims = EmailVerificationClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            kind: TokenKind::EmailVerification,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now,
            exp: now.saturating_add(EMAIL_VERIFICATION_TTL_SECS),
        };
        sign(&claims, &self.access_encoding)
    }

    pub fn verify_email_verification(
        &self,
        token: &str,
    ) -> Result<EmailVerificationClaims, TokenError> {
        self.verify(token, &self.access_decoding, TokenKind::EmailVerification)
    }

    fn verify<C>(&self, token: &str, key: &DecodingKey, expected: TokenKind) -> Result<C, TokenError>
    where
        C: DeserializeOwned + TypedClaims,
    {
        let data = decode::<C>(token, key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

        let kind = data.claims.kind();
        if kind != expected {
            return Err(TokenError::Invalid(format!(
                "expected {expected} token, got {kind}"
            )));
        }

        Ok(data.claims)
    }
}

fn sign<C: Serialize>(claims: &C, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key).map_err(|e| TokenError::Signing(e.to_string()))
}

/// Convert an expiry such as `15m`, `12h`, `7d` or `30s` to seconds.
///
/// Anything without a recognised unit, or without a numeric value,
/// falls back to 900 seconds.
pub fn parse_expiry(expiry: &str) -> u64 {
    let expiry = expiry.trim();
    let Some(unit) = expiry.chars().last() else {
        return FALLBACK_EXPIRY_SECS;
    };
    let Ok(value) = expiry[..expiry.len() - unit.len_utf8()].parse::<u64>() else {
        return FALLBACK_EXPIRY_SECS;
    };

    match unit {
        's' => value,
        'm' => value.saturating_mul(60),
        'h' => value.saturating_mul(60 * 60),
        'd' => value.saturating_mul(24 * 60 * 60),
        _ => FALLBACK_EXPIRY_SECS,
    }
}

/// Token from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>`; anything else is no token.
pub fn extract_bearer_token(header: Option<&str>) -> Option<&str> {
    let parts: Vec<&str> = header?.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Read a JWT payload WITHOUT checking its signature.
///
/// Only for pulling a subject out of a credential whose trust comes from
/// elsewhere (Sign in with Apple). Never use the result to authorize.
pub fn decode_unverified(token: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}
