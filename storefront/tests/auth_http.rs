//! Authentication client against a mock backend

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use passline_storefront::auth::{LoginData, RegisterData, ResetPasswordData};
use passline_storefront::error::AuthError;
use passline_storefront::{ApiClient, ApiError, AuthClient, BearerToken, Session};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, session: &Session) -> AuthClient {
    AuthClient::new(
        ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap(),
        session.clone(),
    )
}

fn auth_body(token: &str) -> serde_json::Value {
    json!({
        "message": "Connexion réussie",
        "data": {
            "user": { "id": 3, "name": "Awa", "email": "awa@example.com" },
            "token": token,
            "token_type": "Bearer"
        }
    })
}

#[tokio::test]
async fn test_login_stores_token_and_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "awa@example.com", "password": "motdepasse" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("tok-1")))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::in_memory();
    let response = client(&server, &session)
        .login(&LoginData {
            email: "awa@example.com".to_string(),
            password: "motdepasse".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.message, "Connexion réussie");
    assert_eq!(session.token().await.unwrap(), Some(BearerToken::new("tok-1")));
    assert_eq!(session.user().await.unwrap().unwrap().id, 3);
}

#[tokio::test]
async fn test_rejected_login_carries_the_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Identifiants invalides" })),
        )
        .mount(&server)
        .await;

    let session = Session::in_memory();
    let error = client(&server, &session)
        .login(&LoginData {
            email: "awa@example.com".to_string(),
            password: "faux".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        AuthError::Api(ApiError::Status { status: 401, ref message }) if message == "Identifiants invalides"
    ));
    assert!(session.token().await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_omits_absent_optional_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "email": "awa@example.com",
            "password": "motdepasse",
            "password_confirmation": "motdepasse",
            "firstname": "Awa"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(auth_body("tok-2")))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::in_memory();
    client(&server, &session)
        .register(&RegisterData {
            email: "awa@example.com".to_string(),
            password: "motdepasse".to_string(),
            password_confirmation: "motdepasse".to_string(),
            firstname: Some("Awa".to_string()),
            ..RegisterData::default()
        })
        .await
        .unwrap();

    assert_eq!(session.token().await.unwrap(), Some(BearerToken::new("tok-2")));
}

#[tokio::test]
async fn test_logout_clears_the_session_even_when_the_backend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("Authorization", "Bearer tok-3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::in_memory();
    session.set_token(&BearerToken::new("tok-3")).await.unwrap();

    let result = client(&server, &session).logout().await;

    assert!(result.is_err());
    assert!(session.token().await.unwrap().is_none());
    assert!(session.user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_password_reset_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_json(json!({ "email": "awa@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Email envoyé" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/reset-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Mot de passe modifié" })))
        .mount(&server)
        .await;

    let session = Session::in_memory();
    let auth = client(&server, &session);

    let sent = auth.forgot_password("awa@example.com").await.unwrap();
    assert_eq!(sent.message, "Email envoyé");

    let reset = auth
        .reset_password(&ResetPasswordData {
            token: "reset-token".to_string(),
            email: "awa@example.com".to_string(),
            password: "nouveau".to_string(),
            password_confirmation: "nouveau".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(reset.message, "Mot de passe modifié");
}
