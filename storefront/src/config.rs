//! Configuration management for the storefront.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::ConfigError;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend endpoints
    pub api: ApiConfig,
    /// Payment widget settings
    pub widget: WidgetConfig,
    /// Checkout settings
    pub checkout: CheckoutConfig,
    /// Local session storage
    pub session: SessionConfig,
    /// Display settings
    pub display: DisplayConfig,
    /// Log filter (`tracing_subscriber::EnvFilter` syntax)
    pub log_filter: String,
}

/// Backend endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root of the catalog and auth API (events, pass types, tags, auth)
    pub base_url: String,
    /// Root of the checkout API (`/v1/checkout/request/init` is appended)
    pub checkout_base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Per-request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Payment widget settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Public widget key; never logged
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Use the gateway sandbox
    pub sandbox: bool,
}

/// Checkout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Currency label used in amounts and the widget reason
    pub currency: String,
    /// `payment_method` sent with every order
    pub payment_method: String,
    /// Delay before leaving a screen whose event could not be found, in milliseconds
    pub not_found_back_delay_ms: u64,
}

/// Local session storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JSON file backing the session; in-memory when unset
    pub file: Option<PathBuf>,
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Offset of the buyer's wall clock from UTC, in minutes
    pub utc_offset_minutes: i32,
}

impl DisplayConfig {
    /// Offset applied when rendering event dates
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unset or unparseable values fall back to their defaults; use
    /// [`Config::validate`] to reject values that parse but make no sense.
    #[must_use]
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api: ApiConfig {
                base_url: lookup("PASSLINE_API_BASE_URL").unwrap_or_else(|| {
                    "https://attendee-api-v1-w52eyawle.sesur.bj/api/v1".to_string()
                }),
                checkout_base_url: lookup("PASSLINE_CHECKOUT_BASE_URL")
                    .unwrap_or_else(|| "https://attendee-api.eyawle.sesur.bj/api".to_string()),
                request_timeout_secs: parse_var(&lookup, "PASSLINE_REQUEST_TIMEOUT_SECS").unwrap_or(30),
            },
            widget: WidgetConfig {
                api_key: lookup("PASSLINE_WIDGET_API_KEY").unwrap_or_default(),
                sandbox: parse_var(&lookup, "PASSLINE_WIDGET_SANDBOX").unwrap_or(true),
            },
            checkout: CheckoutConfig {
                currency: lookup("PASSLINE_CURRENCY").unwrap_or_else(|| "FCFA".to_string()),
                payment_method: lookup("PASSLINE_PAYMENT_METHOD")
                    .unwrap_or_else(|| "kkiapay".to_string()),
                not_found_back_delay_ms: parse_var(&lookup, "PASSLINE_NOT_FOUND_BACK_DELAY_MS")
                    .unwrap_or(2000),
            },
            session: SessionConfig {
                file: lookup("PASSLINE_SESSION_FILE").map(PathBuf::from),
            },
            display: DisplayConfig {
                utc_offset_minutes: parse_var(&lookup, "PASSLINE_UTC_OFFSET_MINUTES").unwrap_or(60),
            },
            log_filter: lookup("PASSLINE_LOG")
                .unwrap_or_else(|| "info,passline_storefront=debug".to_string()),
        }
    }

    /// Check values that parsed but cannot work
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, url) in [
            ("PASSLINE_API_BASE_URL", &self.api.base_url),
            ("PASSLINE_CHECKOUT_BASE_URL", &self.api.checkout_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("expected an http(s) URL, got {url:?}"),
                });
            }
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "PASSLINE_REQUEST_TIMEOUT_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        if !self.widget.sandbox && self.widget.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "PASSLINE_WIDGET_API_KEY",
                reason: "required when the sandbox is disabled".to_string(),
            });
        }

        if FixedOffset::east_opt(self.display.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(ConfigError::Invalid {
                key: "PASSLINE_UTC_OFFSET_MINUTES",
                reason: format!("{} is out of range", self.display.utc_offset_minutes),
            });
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}
