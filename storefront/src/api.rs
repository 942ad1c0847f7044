//! JSON REST client shared by the catalog, auth and checkout clients.
//!
//! Every request sends `Content-Type`/`Accept: application/json` and, when a
//! token is supplied, `Authorization: Bearer <token>`.

use crate::error::{ApiError, GENERIC_API_ERROR};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Bearer token read from the session
///
/// `Debug` is redacted so tokens never end up in logs or traced actions.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Raw response: status plus unparsed body
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Body text
    pub body: String,
}

/// REST client bound to one API root
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Setup`] if the TLS backend cannot be initialised.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing connection pool
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// API root this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&BearerToken>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// `GET` a JSON resource
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send_json`].
    pub async fn get<T>(&self, path: &str, token: Option<&BearerToken>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        Self::send_json(self.request(Method::GET, path, token)).await
    }

    /// `POST` a JSON body and decode the JSON answer
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send_json`].
    pub async fn post<B, T>(
        &self,
        path: &str,
        body: Option<&B>,
        token: Option<&BearerToken>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.request(Method::POST, path, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Self::send_json(builder).await
    }

    /// `POST` a JSON body and return the status and raw body
    ///
    /// Non-2xx statuses are not errors here; callers that need to interpret
    /// error bodies themselves use this.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RequestFailed`] if no response was received.
    pub async fn post_raw<B>(
        &self,
        path: &str,
        body: &B,
        token: Option<&BearerToken>,
    ) -> Result<RawResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .request(Method::POST, path, token)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        Ok(RawResponse { status, body })
    }

    /// Send a request and decode a JSON body
    ///
    /// # Errors
    ///
    /// - [`ApiError::RequestFailed`]: no response
    /// - [`ApiError::Status`]: non-2xx, carrying the body's `message`
    /// - [`ApiError::ResponseParseFailed`]: 2xx with an unexpected body
    async fn send_json<T>(builder: RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "API returned an error status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }
}

/// `message` field of an error body, or the generic fallback
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| GENERIC_API_ERROR.to_string())
}
