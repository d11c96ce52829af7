// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facebook Login verification via the Graph API `/me` endpoint.

use super::{IdentityClaim, IdentityError};
use crate::config::Config;
use crate::models::AuthProvider;
use anyhow::Context;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

const PROFILE_FIELDS: &str = "id,name,email,picture";

type HmacSha256 = Hmac<Sha256>;

pub struct FacebookVerifier {
    http_client: reqwest::Client,
    graph_url: String,
    app_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphProfile {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<GraphPicture>,
}

#[derive(Debug, Deserialize)]
struct GraphPicture {
    data: Option<GraphPictureData>,
}

#[derive(Debug, Deserialize)]
struct GraphPictureData {
    url: Option<String>,
}

impl FacebookVerifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.identity_http_timeout)
            .build()
            .context("failed building Facebook HTTP client")?;

        Ok(Self {
            http_client,
            graph_url: config.facebook_graph_url.trim_end_matches('/').to_string(),
            app_secret: config.facebook_app_secret.clone(),
        })
    }

    /// Look up the profile the access token belongs to.
    ///
    /// Any failure to reach the Graph API, or any non-success answer from
    /// it, is reported as an invalid credential.
    pub async fn verify(&self, access_token: &str) -> Result<IdentityClaim, IdentityError> {
        let mut query = vec![
            ("fields", PROFILE_FIELDS.to_string()),
            ("access_token", access_token.to_string()),
        ];
        if let Some(secret) = &self.app_secret {
            let proof = appsecret_proof(access_token, secret)
                .map_err(|e| invalid(format!("cannot compute appsecret_proof: {e}")))?;
            query.push(("appsecret_proof", proof));
        }

        let response = self
            .http_client
            .get(format!("{}/me", self.graph_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| invalid(format!("Graph API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Graph API rejected access token");
            return Err(invalid(format!("Graph API returned {status}")));
        }

        let profile: GraphProfile = response
            .json()
            .await
            .map_err(|e| invalid(format!("invalid Graph API response: {e}")))?;

        if profile.id.trim().is_empty() {
            return Err(invalid("Graph API response has no user id".to_string()));
        }

        Ok(IdentityClaim {
            provider: AuthProvider::Facebook,
            subject: profile.id,
            email: profile.email,
            display_name: profile.name,
            avatar_url: profile.picture.and_then(|p| p.data).and_then(|d| d.url),
        })
    }
}

fn invalid(reason: String) -> IdentityError {
    IdentityError::invalid(AuthProvider::Facebook, reason)
}

/// Hex HMAC-SHA256 of the access token keyed by the app secret.
fn appsecret_proof(access_token: &str, app_secret: &str) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())?;
    mac.update(access_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
