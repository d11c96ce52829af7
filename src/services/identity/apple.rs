// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign in with Apple.
//!
//! The identity token is obtained by the device's system sign-in sheet
//! and is only decoded here, not signature-checked against Apple's keys.
//! Anyone able to call this endpoint can therefore claim any subject;
//! see DESIGN.md before relying on Apple accounts for anything sensitive.

use super::{IdentityClaim, IdentityError};
use crate::models::AuthProvider;
use crate::services::tokens::decode_unverified;

pub struct AppleVerifier;

impl AppleVerifier {
    pub fn verify(&self, id_token: &str) -> Result<IdentityClaim, IdentityError> {
        let claims = decode_unverified(id_token).ok_or_else(|| {
            IdentityError::invalid(AuthProvider::Apple, "identity token is not a JWT")
        })?;

        let subject = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| IdentityError::invalid(AuthProvider::Apple, "missing sub claim"))?;

        Ok(IdentityClaim {
            provider: AuthProvider::Apple,
            subject: subject.to_string(),
            email: claims
                .get("email")
                .and_then(|v| v.as_str())
                .map(String::from),
            display_name: None,
            avatar_url: None,
        })
    }
}
