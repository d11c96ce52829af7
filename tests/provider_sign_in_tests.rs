// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in through each identity provider, against local provider stubs.

mod common;

use axum::http::StatusCode;
use common::{
    apple_id_token, create_test_app, create_test_app_with_providers, google_id_token,
    FB_TOKEN_BAD_EMAIL, FB_TOKEN_NO_EMAIL, FB_TOKEN_WITH_EMAIL, GOOGLE_VALID_CODE,
};
use serde_json::json;

// ─── Google ──────────────────────────────────────────────────

#[tokio::test]
async fn test_google_missing_token() {
    let app = create_test_app();

    for body in [json!({}), json!({ "idToken": "" }), json!({ "idToken": null })] {
        let (status, resp) = app.post("/api/auth/google", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["success"], false);
        assert_eq!(resp["message"], "Google authentication token is required");
    }
}

#[tokio::test]
async fn test_google_without_email() {
    let app = create_test_app();

    let (status, body) = app
        .post(
            "/api/auth/google",
            json!({ "idToken": google_id_token(None, "g-no-email") }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Google account email is required");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_google_garbage_token_rejected() {
    let app = create_test_app_with_providers().await;

    let (status, body) = app
        .post("/api/auth/google", json!({ "idToken": "definitely-not-valid" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid Google token");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_google_authorization_code_exchange() {
    let app = create_test_app_with_providers().await;

    let (status, body) = app
        .post("/api/auth/google", json!({ "idToken": GOOGLE_VALID_CODE }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user"]["email"], "code.user@example.com");
    assert_eq!(body["data"]["user"]["authProvider"], "google");
}

#[tokio::test]
async fn test_google_user_data_name_overrides_display_name() {
    let app = create_test_app();

    let (status, body) = app
        .post(
            "/api/auth/google",
            json!({
                "idToken": google_id_token(Some("jane@example.com"), "g-1"),
                "userData": { "name": "Janie" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["displayName"], "Janie");
    assert_eq!(
        body["data"]["user"]["avatar"],
        "https://lh3.googleusercontent.com/a/jane"
    );
}

// ─── Facebook ────────────────────────────────────────────────

#[tokio::test]
async fn test_facebook_with_email() {
    let app = create_test_app_with_providers().await;

    let (status, body) = app
        .post(
            "/api/auth/facebook",
            json!({ "accessToken": FB_TOKEN_WITH_EMAIL }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Facebook sign in successful");

    let user = &body["data"]["user"];
    assert_eq!(user["email"], "jane.fb@example.com");
    assert_eq!(user["authProvider"], "facebook");
    assert_eq!(user["displayName"], "Jane Doe");
    assert_eq!(
        user["avatar"],
        "https://graph.facebook.com/1029384756/picture"
    );
}

#[tokio::test]
async fn test_facebook_without_email_uses_placeholder() {
    let app = create_test_app_with_providers().await;

    let (status, first) = app
        .post("/api/auth/facebook", json!({ "accessToken": FB_TOKEN_NO_EMAIL }))
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(
        first["data"]["user"]["email"],
        "facebook_5647382910@vireal.com"
    );
    assert_eq!(first["data"]["user"]["displayName"], "Private Person");

    let username = first["data"]["user"]["username"].as_str().unwrap();
    assert!(username.starts_with("privateperson"), "{username}");
    assert_eq!(username.len(), "privateperson".len() + 4);

    // Same Facebook account resolves to the same user
    let (status, second) = app
        .post("/api/auth/facebook", json!({ "accessToken": FB_TOKEN_NO_EMAIL }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["user"]["id"], second["data"]["user"]["id"]);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_facebook_malformed_email_is_bad_request() {
    let app = create_test_app_with_providers().await;

    let (status, body) = app
        .post("/api/auth/facebook", json!({ "accessToken": FB_TOKEN_BAD_EMAIL }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Facebook account email is invalid");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_facebook_invalid_token() {
    let app = create_test_app_with_providers().await;

    let (status, body) = app
        .post("/api/auth/facebook", json!({ "accessToken": "expired-token" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid Facebook token");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_facebook_missing_token() {
    let app = create_test_app();

    let (status, body) = app.post("/api/auth/facebook", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Facebook access token is required");
}

// ─── Apple ───────────────────────────────────────────────────

#[tokio::test]
async fn test_apple_with_email() {
    let app = create_test_app();
    let token = apple_id_token(json!({
        "iss": "https://appleid.apple.com",
        "sub": "001234.abcdef.0987",
        "email": "Jane@PrivateRelay.AppleID.com"
    }));

    let (status, body) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Apple sign in successful");

    let user = &body["data"]["user"];
    assert_eq!(user["email"], "jane@privaterelay.appleid.com");
    assert_eq!(user["authProvider"], "apple");
    assert_eq!(user["displayName"], "Apple User");
    assert!(user["username"].as_str().unwrap().starts_with("appleuser"));
}

#[tokio::test]
async fn test_apple_without_email_uses_placeholder() {
    let app = create_test_app();
    let token = apple_id_token(json!({ "sub": "001234.ABCDEF.0987" }));

    let (status, body) = app
        .post(
            "/api/auth/apple",
            json!({ "idToken": token, "userData": { "name": "Jane Appleseed" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["data"]["user"]["email"],
        "apple_001234.abcdef.0987@vireal.com"
    );
    assert_eq!(body["data"]["user"]["displayName"], "Jane Appleseed");

    // Same Apple subject resolves to the same user
    let token = apple_id_token(json!({ "sub": "001234.ABCDEF.0987" }));
    let (status, second) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_eq!(body["data"]["user"]["id"], second["data"]["user"]["id"]);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_apple_malformed_email_is_bad_request() {
    let app = create_test_app();
    let token = apple_id_token(json!({ "sub": "001.abc", "email": "not-an-email" }));

    let (status, body) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Apple account email is invalid");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_apple_subject_unusable_for_placeholder_is_bad_request() {
    let app = create_test_app();
    let token = apple_id_token(json!({ "sub": "a b" }));

    let (status, body) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Apple account email is invalid");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_apple_missing_sub() {
    let app = create_test_app();
    let token = apple_id_token(json!({ "email": "jane@example.com" }));

    let (status, body) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid Apple token");
}

#[tokio::test]
async fn test_apple_malformed_token() {
    let app = create_test_app();

    for token in ["only.two", "a.b.c.d", "!!!.@@@.###"] {
        let (status, _) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token}");
    }

    let (status, body) = app.post("/api/auth/apple", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Apple ID token is required");
}

// ─── Cross-provider ──────────────────────────────────────────

#[tokio::test]
async fn test_same_email_across_providers_is_one_user() {
    let app = create_test_app();

    let google = app.google_sign_in("jane@privaterelay.appleid.com").await;
    let token = apple_id_token(json!({
        "sub": "001234.abcdef.0987",
        "email": "jane@privaterelay.appleid.com"
    }));
    let (status, apple) = app.post("/api/auth/apple", json!({ "idToken": token })).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(google["user"]["id"], apple["data"]["user"]["id"]);
    // The account keeps the provider it was created with
    assert_eq!(apple["data"]["user"]["authProvider"], "google");
}
