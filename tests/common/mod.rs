// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::{to_bytes, Body};
use axum::extract::Query;
use axum::http::{header, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use vireal_auth::config::Config;
use vireal_auth::db::MemoryStore;
use vireal_auth::routes::create_router;
use vireal_auth::services::identity::{AppleVerifier, FacebookVerifier, GoogleVerifier};
use vireal_auth::services::{IdentityVerifiers, TokenService, UserDirectory};
use vireal_auth::AppState;

pub const GOOGLE_TEST_SECRET: &[u8] = b"google-fixture-signing-secret";
pub const GOOGLE_TEST_KID: &str = "test-kid";
pub const GOOGLE_TEST_AUDIENCE: &str = "test-google-client.apps.googleusercontent.com";

/// Facebook access token the stub answers with a full profile.
pub const FB_TOKEN_WITH_EMAIL: &str = "fb-token-with-email";
/// Facebook access token the stub answers with a profile lacking email.
pub const FB_TOKEN_NO_EMAIL: &str = "fb-token-no-email";
/// Facebook access token the stub answers with a malformed email.
pub const FB_TOKEN_BAD_EMAIL: &str = "fb-token-bad-email";
/// Authorization code the stub token endpoint accepts.
pub const GOOGLE_VALID_CODE: &str = "4/0-valid-auth-code";

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body, None)).await
    }

    /// Sign in with a fresh Google fixture and return `data`.
    pub async fn google_sign_in(&self, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/google",
                json!({ "idToken": google_id_token(Some(email), "google-sub-1") }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"].clone()
    }
}

/// Create a test app with the default (development) config and an
/// in-memory store. Provider endpoints are not reachable.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::default())
}

/// Create a test app whose identity verifiers talk to a local stub.
#[allow(dead_code)]
pub async fn create_test_app_with_providers() -> TestApp {
    let base_url = spawn_provider_stub().await;
    create_test_app_with(Config {
        facebook_graph_url: base_url.clone(),
        google_token_url: format!("{base_url}/token"),
        google_client_secret: Some("test-google-secret".to_string()),
        ..Config::default()
    })
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let identity = IdentityVerifiers {
        google: GoogleVerifier::new_with_static_key(
            &config,
            GOOGLE_TEST_KID,
            DecodingKey::from_secret(GOOGLE_TEST_SECRET),
            Algorithm::HS256,
        )
        .unwrap(),
        facebook: FacebookVerifier::new(&config).unwrap(),
        apple: AppleVerifier,
    };

    let state = Arc::new(AppState {
        tokens: TokenService::new(&config),
        users: UserDirectory::new(store.clone()),
        identity,
        config,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Google ID token signed with the static test key.
pub fn google_id_token(email: Option<&str>, sub: &str) -> String {
    let now = now_secs();
    let mut claims = json!({
        "iss": "https://accounts.google.com",
        "aud": GOOGLE_TEST_AUDIENCE,
        "sub": sub,
        "iat": now,
        "exp": now + 3600,
        "name": "Jane Doe",
        "picture": "https://lh3.googleusercontent.com/a/jane"
    });
    if let Some(email) = email {
        claims["email"] = json!(email);
        claims["email_verified"] = json!(true);
    }

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(GOOGLE_TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(GOOGLE_TEST_SECRET)).unwrap()
}

/// Unsigned-looking Apple identity token.
#[allow(dead_code)]
pub fn apple_id_token(payload: Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"W6WcOKB"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode("signature")
    )
}

/// Session token signed with an arbitrary key and claims.
#[allow(dead_code)]
pub fn sign_session_token(claims: &Value, secret: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "VirealTest/1.0 (iPhone)");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn get_request(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

/// Local stand-in for the Facebook Graph API and Google token endpoint.
#[allow(dead_code)]
async fn spawn_provider_stub() -> String {
    async fn me(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        match params.get("access_token").map(String::as_str) {
            Some(FB_TOKEN_WITH_EMAIL) => (
                StatusCode::OK,
                Json(json!({
                    "id": "1029384756",
                    "name": "Jane Doe",
                    "email": "Jane.FB@Example.com",
                    "picture": { "data": { "url": "https://graph.facebook.com/1029384756/picture" } }
                })),
            ),
            Some(FB_TOKEN_BAD_EMAIL) => (
                StatusCode::OK,
                Json(json!({ "id": "7788990011", "name": "Odd Data", "email": "odd at example" })),
            ),
            Some(FB_TOKEN_NO_EMAIL) => (
                StatusCode::OK,
                Json(json!({ "id": "5647382910", "name": "Private Person" })),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": { "message": "Invalid OAuth access token.", "type": "OAuthException", "code": 190 }
                })),
            ),
        }
    }

    async fn token(Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        let valid = form.get("code").map(String::as_str) == Some(GOOGLE_VALID_CODE)
            && form.get("grant_type").map(String::as_str) == Some("authorization_code")
            && form.get("client_secret").map(String::as_str) == Some("test-google-secret");
        if valid {
            (
                StatusCode::OK,
                Json(json!({
                    "access_token": "ya29.test",
                    "id_token": google_id_token(Some("code.user@example.com"), "google-sub-code")
                })),
            )
        } else {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            )
        }
    }

    let app = Router::new()
        .route("/me", get(me))
        .route("/token", post(token));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
