//! Error types for the storefront.
//!
//! Each concern gets its own enum. [`CheckoutError`] is the taxonomy shown to
//! buyers: its `Display` output is the text of the alert.

use crate::types::EventId;
use thiserror::Error;

/// Fallback message when the backend gives no usable error text
pub const GENERIC_API_ERROR: &str = "Une erreur est survenue";

/// Errors from the REST client
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never got a response (offline, DNS, timeout)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The response body was not the expected JSON
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// The backend answered with a non-2xx status
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `message` field of the body, or a generic fallback
        message: String,
    },

    /// The HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    /// HTTP status, if the backend answered
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from catalog lookups
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The event exists neither at its own endpoint nor in the full listing
    #[error("Événement {0} introuvable")]
    NotFound(EventId),

    /// Transport or backend failure
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from local session storage
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing the session file failed
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be (de)serialized
    #[error("Session data is corrupted: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the authentication client
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the request or was unreachable
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The token or profile could not be persisted
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Invalid configuration value
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but unusable
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Why a checkout attempt failed
///
/// The `Display` text is what the buyer sees; `kind()` is the stable label
/// used in logs and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Local precondition failed; no request was sent
    #[error("{0}")]
    Validation(String),

    /// The finalize request never got a response
    #[error("{0}")]
    Network(String),

    /// The backend rejected the order
    #[error("[{status}] {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message extracted from `errors` or `message`
        message: String,
    },

    /// The backend answered with a body that is not JSON
    #[error("Erreur de format de la réponse du serveur")]
    MalformedResponse {
        /// HTTP status code
        status: u16,
    },

    /// The payment widget reported a failure
    #[error("{0}")]
    Gateway(String),
}

impl CheckoutError {
    /// Message shown to the buyer
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Network(_) => "network",
            Self::Server { .. } => "server",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Gateway(_) => "gateway",
        }
    }
}
