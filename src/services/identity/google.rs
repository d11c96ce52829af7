// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sign-In verification.
//!
//! The client may send either an ID token or a one-time authorization
//! code. The value is first verified as an ID token; if that fails and a
//! client secret is configured, it is exchanged as a code and the returned
//! ID token is verified instead.

use super::{IdentityClaim, IdentityError};
use crate::config::Config;
use crate::models::AuthProvider;
use crate::time_utils::now_unix_secs;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
        algorithm: Algorithm,
    },
}

#[derive(Clone)]
struct DiscoveryCacheEntry {
    jwks_uri: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google ID tokens and authorization codes.
pub struct GoogleVerifier {
    http_client: reqwest::Client,
    client_ids: Vec<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    token_url: String,
    mode: VerifierMode,
    discovery_cache: RwLock<Option<DiscoveryCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl GoogleVerifier {
    /// Create a production verifier that discovers and caches Google JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let verifier = Self::with_mode(config, VerifierMode::Google)?;

        tracing::info!(
            audiences = ?verifier.client_ids,
            code_exchange = verifier.client_secret.is_some(),
            "Initialized Google identity verifier"
        );

        Ok(verifier)
    }

    /// Create a verifier that trusts one fixed key.
    ///
    /// Intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
        algorithm: Algorithm,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static Google kid must not be empty");
        }

        Self::with_mode(
            config,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
                algorithm,
            },
        )
    }

    fn with_mode(config: &Config, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.identity_http_timeout)
            .build()
            .context("failed building Google HTTP client")?;

        Ok(Self {
            http_client,
            client_ids: config.google_client_ids.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            token_url: config.google_token_url.clone(),
            mode,
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify an ID token or authorization code.
    pub async fn verify(&self, credential: &str) -> Result<IdentityClaim, IdentityError> {
        let claims = match self.verify_id_token(credential).await {
            Ok(claims) => claims,
            Err(id_token_err) => {
                tracing::debug!(error = %id_token_err, "Not a valid ID token, trying code exchange");
                self.verify_auth_code(credential).await.map_err(|code_err| {
                    invalid(format!(
                        "id token: {id_token_err}; authorization code: {code_err}"
                    ))
                })?
            }
        };

        // An unverified address is no address
        let email = match claims.email_verified {
            Some(false) => None,
            _ => claims.email,
        };

        Ok(IdentityClaim {
            provider: AuthProvider::Google,
            subject: claims.sub,
            email,
            display_name: claims.name,
            avatar_url: claims.picture,
        })
    }

    async fn verify_auth_code(&self, code: &str) -> Result<GoogleIdTokenClaims, String> {
        let Some(client_secret) = &self.client_secret else {
            return Err("code exchange not configured".to_string());
        };

        let client_id = self
            .client_ids
            .first()
            .ok_or_else(|| "no Google client ID configured".to_string())?;

        let mut form = vec![
            ("code", code),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(redirect_uri) = &self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("token request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("token endpoint returned {}", response.status()));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid token response: {e}"))?;

        let id_token = tokens
            .id_token
            .ok_or_else(|| "no ID token received from code exchange".to_string())?;

        self.verify_id_token(&id_token).await
    }

    async fn verify_id_token(&self, token: &str) -> Result<GoogleIdTokenClaims, String> {
        let header = decode_header(token).map_err(|e| format!("invalid JWT header: {e}"))?;

        let expected_alg = match &self.mode {
            VerifierMode::Google => Algorithm::RS256,
            VerifierMode::StaticKey { algorithm, .. } => *algorithm,
        };
        if header.alg != expected_alg {
            return Err(format!("unexpected JWT alg: {:?}", header.alg));
        }

        let kid = header.kid.ok_or_else(|| "missing JWT kid".to_string())?;
        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(expected_alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&self.client_ids);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| format!("JWT validation failed: {e}"))?
            .claims;

        validate_iat(claims.iat)?;
        Ok(claims)
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, String> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
                ..
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(format!("unknown JWT kid for static verifier: {kid}"));
            }
            VerifierMode::Google => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(format!("JWT kid not found in JWKS after refresh: {kid}"))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), String> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_uri = self.resolve_jwks_uri(force_refresh).await?;
        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| format!("JWKS request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("JWKS request returned status {}", response.status()));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| format!("invalid JWKS JSON: {e}"))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err("JWKS response did not include any usable RSA keys".to_string());
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }

    async fn resolve_jwks_uri(&self, force_refresh: bool) -> Result<String, String> {
        let cached = self.discovery_cache.read().await.clone();
        if !force_refresh {
            if let Some(entry) = cached
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
            {
                return Ok(entry.jwks_uri.clone());
            }
        }
        let fallback = cached
            .map(|entry| entry.jwks_uri)
            .unwrap_or_else(|| DEFAULT_JWKS_URL.to_string());

        match self.http_client.get(DISCOVERY_URL).send().await {
            Ok(resp) if resp.status().is_success() => {
                let ttl = cache_ttl_from_headers(resp.headers(), DEFAULT_CACHE_TTL);
                let discovery: OpenIdConfig = resp
                    .json()
                    .await
                    .map_err(|e| format!("invalid discovery JSON: {e}"))?;

                *self.discovery_cache.write().await = Some(DiscoveryCacheEntry {
                    jwks_uri: discovery.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });

                Ok(discovery.jwks_uri)
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    "OIDC discovery returned non-success status; using fallback JWKS URI"
                );
                Ok(fallback)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OIDC discovery request failed; using fallback JWKS URI");
                Ok(fallback)
            }
        }
    }
}

fn invalid(reason: String) -> IdentityError {
    IdentityError::invalid(AuthProvider::Google, reason)
}

/// RSA signing keys from a JWKS document, by key ID.
fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn validate_iat(iat: Option<u64>) -> Result<(), String> {
    let Some(iat) = iat else {
        return Err("missing iat claim".to_string());
    };

    if iat > now_unix_secs() + CLOCK_SKEW_SECS {
        return Err("iat claim is in the future".to_string());
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"google-test-signing-secret";

    fn verifier() -> GoogleVerifier {
        GoogleVerifier::new_with_static_key(
            &Config::default(),
            "test-kid",
            DecodingKey::from_secret(SECRET),
            Algorithm::HS256,
        )
        .unwrap()
    }

    fn sign(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn base_claims() -> serde_json::Value {
        let now = now_unix_secs();
        json!({
            "iss": "https://accounts.google.com",
            "aud": "test-google-client.apps.googleusercontent.com",
            "sub": "1122334455",
            "iat": now,
            "exp": now + 3600,
            "email": "Jane@Example.com",
            "email_verified": true,
            "name": "Jane Doe",
            "picture": "https://lh3.googleusercontent.com/a/photo"
        })
    }

    #[tokio::test]
    async fn test_valid_id_token() {
        let claim = verifier().verify(&sign(base_claims(), "test-kid")).await.unwrap();
        assert_eq!(claim.provider, AuthProvider::Google);
        assert_eq!(claim.subject, "1122334455");
        assert_eq!(claim.email.as_deref(), Some("Jane@Example.com"));
        assert_eq!(claim.display_name.as_deref(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected() {
        let mut claims = base_claims();
        claims["aud"] = json!("someone-else.apps.googleusercontent.com");

        let err = verifier().verify(&sign(claims, "test-kid")).await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredential { .. }));
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let mut claims = base_claims();
        claims["iss"] = json!("https://evil.example.com");

        assert!(verifier().verify(&sign(claims, "test-kid")).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_kid_rejected() {
        assert!(verifier()
            .verify(&sign(base_claims(), "other-kid"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_future_iat_rejected() {
        let mut claims = base_claims();
        claims["iat"] = json!(now_unix_secs() + 3 * CLOCK_SKEW_SECS);

        assert!(verifier().verify(&sign(claims, "test-kid")).await.is_err());
    }

    #[tokio::test]
    async fn test_unverified_email_dropped() {
        let mut claims = base_claims();
        claims["email_verified"] = json!(false);

        let claim = verifier().verify(&sign(claims, "test-kid")).await.unwrap();
        assert_eq!(claim.email, None);
    }

    #[tokio::test]
    async fn test_garbage_without_code_exchange_is_invalid() {
        let err = verifier().verify("4/0AfJohXn-not-a-jwt").await.unwrap_err();
        match err {
            IdentityError::InvalidCredential { provider, reason } => {
                assert_eq!(provider, AuthProvider::Google);
                assert!(reason.contains("code exchange not configured"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_cache_control_max_age() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
    }

    #[test]
    fn test_usable_keys_filters() {
        let jwks: Jwks = serde_json::from_value(json!({
            "keys": [
                {"kid": "ec", "kty": "EC", "n": "", "e": ""},
                {"kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB"},
                {"kid": "", "kty": "RSA", "n": "AQAB", "e": "AQAB"},
                {"kid": "ok", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB"}
            ]
        }))
        .unwrap();

        let keys = usable_keys(jwks);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("ok"));
    }
}
