//! Authentication client: register, login, logout and password reset.
//!
//! Successful register/login store the returned token and cache the profile
//! in the [`Session`]. Logout always clears both locally, whatever the
//! backend answers.

use crate::api::{ApiClient, BearerToken};
use crate::error::AuthError;
use crate::session::Session;
use crate::types::User;
use serde::{Deserialize, Serialize};

/// Registration form
#[derive(Clone, Debug, Default, Serialize)]
pub struct RegisterData {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
    /// Password confirmation
    pub password_confirmation: String,
    /// First name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    /// Last name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Phone number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
}

/// Login form
#[derive(Clone, Debug, Serialize)]
pub struct LoginData {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
}

/// Password reset form
#[derive(Clone, Debug, Serialize)]
pub struct ResetPasswordData {
    /// Token from the reset email
    pub token: String,
    /// Email address
    pub email: String,
    /// New password
    pub password: String,
    /// New password confirmation
    pub password_confirmation: String,
}

/// Body of a successful register/login
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    /// Server message
    #[serde(default)]
    pub message: String,
    /// Session payload
    pub data: AuthData,
}

/// Session payload of an [`AuthResponse`]
#[derive(Clone, Debug, Deserialize)]
pub struct AuthData {
    /// Signed-in user
    pub user: User,
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Token type, normally `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Body carrying only a message
#[derive(Clone, Debug, Deserialize)]
pub struct MessageResponse {
    /// Server message
    #[serde(default)]
    pub message: String,
}

/// Authentication endpoints under the catalog API root
#[derive(Clone, Debug)]
pub struct AuthClient {
    api: ApiClient,
    session: Session,
}

impl AuthClient {
    /// Create a client that records sessions in `session`
    #[must_use]
    pub const fn new(api: ApiClient, session: Session) -> Self {
        Self { api, session }
    }

    /// `POST /auth/register`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] if the backend rejects the request and
    /// [`AuthError::Session`] if the token cannot be stored.
    #[tracing::instrument(skip_all)]
    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse, AuthError> {
        let response: AuthResponse = self.api.post("/auth/register", Some(data), None).await?;
        self.remember(&response).await?;
        tracing::info!(user_id = response.data.user.id, "Registered");
        Ok(response)
    }

    /// `POST /auth/login`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] if the backend rejects the credentials and
    /// [`AuthError::Session`] if the token cannot be stored.
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, data: &LoginData) -> Result<AuthResponse, AuthError> {
        let response: AuthResponse = self.api.post("/auth/login", Some(data), None).await?;
        self.remember(&response).await?;
        tracing::info!(user_id = response.data.user.id, "Logged in");
        Ok(response)
    }

    /// `POST /auth/logout`
    ///
    /// The local token and profile are cleared even if the request fails.
    ///
    /// # Errors
    ///
    /// Returns the request error, if any, after clearing the session.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), AuthError> {
        let token = self.session.token().await?;
        let outcome = self
            .api
            .post::<(), serde_json::Value>("/auth/logout", None, token.as_ref())
            .await;

        self.session.clear_token().await?;
        self.session.clear_user().await?;

        match outcome {
            Ok(_) => {
                tracing::info!("Logged out");
                Ok(())
            },
            Err(error) => {
                tracing::warn!(%error, "Logout request failed; local session cleared anyway");
                Err(error.into())
            },
        }
    }

    /// `POST /auth/forgot-password`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] on failure.
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, AuthError> {
        let body = serde_json::json!({ "email": email });
        Ok(self.api.post("/auth/forgot-password", Some(&body), None).await?)
    }

    /// `POST /auth/reset-password`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Api`] on failure.
    pub async fn reset_password(
        &self,
        data: &ResetPasswordData,
    ) -> Result<MessageResponse, AuthError> {
        Ok(self.api.post("/auth/reset-password", Some(data), None).await?)
    }

    async fn remember(&self, response: &AuthResponse) -> Result<(), AuthError> {
        if let Some(token) = response.data.token.as_deref().filter(|t| !t.is_empty()) {
            self.session.set_token(&BearerToken::new(token)).await?;
        }
        self.session.set_user(&response.data.user).await?;
        Ok(())
    }
}
