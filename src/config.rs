// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything here is read once at startup and never mutated afterwards;
//! signing secrets and token lifetimes reach the token service and the
//! identity verifiers only through this value.

use std::env;
use std::time::Duration;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:19006,*.vireal.app";
const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com";

/// Deployment environment. Controls whether error details are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    pub environment: Environment,
    /// Origins allowed for cross-origin requests. Entries of the form
    /// `*.example.com` match any subdomain.
    pub allowed_origins: Vec<String>,
    /// GCP project for Firestore. Without it the in-memory store is used.
    pub gcp_project_id: Option<String>,

    // --- Session tokens ---
    /// HMAC key for access (and auxiliary) tokens
    pub access_token_secret: Vec<u8>,
    /// HMAC key for refresh tokens
    pub refresh_token_secret: Vec<u8>,
    /// Access token lifetime, e.g. `15m`
    pub access_token_expiry: String,
    /// Refresh token lifetime, e.g. `7d`
    pub refresh_token_expiry: String,

    // --- Identity providers ---
    /// Accepted audiences for Google ID tokens (web, iOS, Android clients)
    pub google_client_ids: Vec<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
    pub google_token_url: String,
    pub facebook_graph_url: String,
    pub facebook_app_secret: Option<String>,
    /// Upper bound on any call to a third-party identity endpoint
    pub identity_http_timeout: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            environment: Environment::Development,
            allowed_origins: split_list(DEFAULT_ALLOWED_ORIGINS),
            gcp_project_id: None,
            access_token_secret: b"test_access_secret_32_bytes_min!!".to_vec(),
            refresh_token_secret: b"test_refresh_secret_32_bytes_min!".to_vec(),
            access_token_expiry: "15m".to_string(),
            refresh_token_expiry: "7d".to_string(),
            google_client_ids: vec!["test-google-client.apps.googleusercontent.com".to_string()],
            google_client_secret: None,
            google_redirect_uri: None,
            google_token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
            facebook_graph_url: DEFAULT_FACEBOOK_GRAPH_URL.to_string(),
            facebook_app_secret: None,
            identity_http_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let access_token_secret = required("JWT_ACCESS_SECRET")?.into_bytes();
        let refresh_token_secret = required("JWT_REFRESH_SECRET")?.into_bytes();
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ",
            ));
        }

        let google_client_ids = split_list(&required("GOOGLE_CLIENT_IDS")?);
        if google_client_ids.is_empty() {
            return Err(ConfigError::Invalid("GOOGLE_CLIENT_IDS is empty"));
        }

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            environment,
            allowed_origins: split_list(
                &env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            gcp_project_id: optional("GCP_PROJECT_ID"),
            access_token_secret,
            refresh_token_secret,
            access_token_expiry: env::var("JWT_ACCESS_EXPIRY").unwrap_or_else(|_| "15m".into()),
            refresh_token_expiry: env::var("JWT_REFRESH_EXPIRY").unwrap_or_else(|_| "7d".into()),
            google_client_ids,
            google_client_secret: optional("GOOGLE_CLIENT_SECRET"),
            google_redirect_uri: optional("GOOGLE_REDIRECT_URI"),
            google_token_url: env::var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_TOKEN_URL.to_string()),
            facebook_graph_url: env::var("FACEBOOK_GRAPH_URL")
                .unwrap_or_else(|_| DEFAULT_FACEBOOK_GRAPH_URL.to_string()),
            facebook_app_secret: optional("FACEBOOK_APP_SECRET"),
            identity_http_timeout: Duration::from_secs(
                env::var("IDENTITY_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether `origin` is allowed by the configured CORS list.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| {
            match allowed.strip_prefix("*.") {
                Some(domain) => origin
                    .rsplit_once("://")
                    .map(|(_, host)| host)
                    .unwrap_or(origin)
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.')),
                None => allowed == origin,
            }
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_ACCESS_SECRET", "access_secret_for_tests");
        env::set_var("JWT_REFRESH_SECRET", "refresh_secret_for_tests");
        env::set_var("GOOGLE_CLIENT_IDS", "web.apps.googleusercontent.com, ios.apps.googleusercontent.com");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.access_token_secret, b"access_secret_for_tests");
        assert_eq!(config.google_client_ids.len(), 2);
        assert_eq!(config.google_client_ids[1], "ios.apps.googleusercontent.com");
        assert_eq!(config.identity_http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_origin_allowed() {
        let config = Config::default();

        assert!(config.origin_allowed("http://localhost:5173"));
        assert!(config.origin_allowed("http://localhost:19006"));
        assert!(config.origin_allowed("https://app.vireal.app"));
        assert!(config.origin_allowed("https://staging.app.vireal.app"));
        assert!(!config.origin_allowed("https://vireal.app.evil.com"));
        assert!(!config.origin_allowed("https://notvireal.app"));
        assert!(!config.origin_allowed("http://localhost:3000"));
    }
}
