//! Local session: auth token, cached profile, onboarding flag and theme.
//!
//! Values live in a [`KeyValueStore`] (string keys, string values), either in
//! memory or in a JSON file. [`Session`] is the typed accessor handed to the
//! components that need it.

use crate::api::BearerToken;
use crate::error::SessionError;
use crate::types::User;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Session result
pub type SessionResult<T> = Result<T, SessionError>;

/// Boxed future returned by key-value operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = SessionResult<T>> + Send + 'a>>;

const TOKEN_KEY: &str = "auth_token";
const USER_KEY: &str = "user_data";
const THEME_KEY: &str = "theme_mode";
const ONBOARDING_KEY: &str = "onboarding_completed";

/// Asynchronous string key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Write a value
    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

    /// Delete a value; deleting a missing key is not an error
    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Volatile store for tests and the demo
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.values.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.values.lock().await.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.values.lock().await.remove(key);
            Ok(())
        })
    }
}

/// Store persisted as one JSON object in a file
///
/// The whole file is rewritten on every change. Writes go to a sibling
/// temporary file first and are then renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Use `path`, which need not exist yet
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> SessionResult<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> SessionResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(values)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.read_all().await?.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut values = self.read_all().await?;
            values.insert(key.to_string(), value);
            self.write_all(&values).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut values = self.read_all().await?;
            if values.remove(key).is_some() {
                self.write_all(&values).await?;
            }
            Ok(())
        })
    }
}

/// Stored theme preference
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Always light
    Light,
    /// Always dark
    Dark,
    /// Follow the system
    #[default]
    #[serde(rename = "auto")]
    System,
}

impl ThemeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "auto",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "auto" => Some(Self::System),
            _ => None,
        }
    }

    /// Theme actually applied given the system appearance
    ///
    /// `System` resolves to dark unless the system explicitly reports light.
    #[must_use]
    pub const fn effective(self, system: Option<Appearance>) -> Appearance {
        match (self, system) {
            (Self::Light, _) | (Self::System, Some(Appearance::Light)) => Appearance::Light,
            _ => Appearance::Dark,
        }
    }

    /// Preference stored by a theme toggle
    #[must_use]
    pub const fn toggled(self, system: Option<Appearance>) -> Self {
        match self.effective(system) {
            Appearance::Dark => Self::Light,
            Appearance::Light => Self::Dark,
        }
    }
}

/// Concrete appearance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Appearance {
    /// Light colors
    Light,
    /// Dark colors
    Dark,
}

/// First screen to show on launch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Landing {
    /// Signed in
    Dashboard,
    /// Never completed onboarding
    Onboarding,
    /// Onboarded but signed out
    Login,
}

/// Typed accessor over a [`KeyValueStore`]
///
/// Cheap to clone; passed explicitly to whatever needs it.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap a store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Session over a fresh [`MemoryStore`]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Session over a file, or in memory when `path` is `None`
    #[must_use]
    pub fn from_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::new(Arc::new(JsonFileStore::new(path))),
            None => Self::in_memory(),
        }
    }

    /// Stored auth token
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be read.
    pub async fn token(&self) -> SessionResult<Option<BearerToken>> {
        Ok(self
            .store
            .get(TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty())
            .map(BearerToken::new))
    }

    /// Persist the auth token
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be written.
    pub async fn set_token(&self, token: &BearerToken) -> SessionResult<()> {
        self.store.set(TOKEN_KEY, token.expose().to_string()).await
    }

    /// Forget the auth token
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be written.
    pub async fn clear_token(&self) -> SessionResult<()> {
        self.store.remove(TOKEN_KEY).await
    }

    /// Cached user profile
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be read or the profile is corrupted.
    pub async fn user(&self) -> SessionResult<Option<User>> {
        match self.store.get(USER_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Cache the user profile
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be written.
    pub async fn set_user(&self, user: &User) -> SessionResult<()> {
        self.store.set(USER_KEY, serde_json::to_string(user)?).await
    }

    /// Drop the cached profile
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be written.
    pub async fn clear_user(&self) -> SessionResult<()> {
        self.store.remove(USER_KEY).await
    }

    /// Whether onboarding was completed on this device
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be read.
    pub async fn has_completed_onboarding(&self) -> SessionResult<bool> {
        Ok(self.store.get(ONBOARDING_KEY).await?.as_deref() == Some("true"))
    }

    /// Remember that onboarding was completed
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be written.
    pub async fn complete_onboarding(&self) -> SessionResult<()> {
        self.store.set(ONBOARDING_KEY, "true".to_string()).await
    }

    /// Stored theme preference
    ///
    /// Preferences only apply to signed-in users: without a cached profile
    /// the stored value is discarded and `System` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be accessed.
    pub async fn theme_mode(&self) -> SessionResult<ThemeMode> {
        let has_user = self.store.get(USER_KEY).await?.is_some();
        if !has_user {
            self.store.remove(THEME_KEY).await?;
            return Ok(ThemeMode::System);
        }

        Ok(self
            .store
            .get(THEME_KEY)
            .await?
            .as_deref()
            .and_then(ThemeMode::parse)
            .unwrap_or_default())
    }

    /// Persist a theme preference
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be written.
    pub async fn set_theme_mode(&self, mode: ThemeMode) -> SessionResult<()> {
        self.store.set(THEME_KEY, mode.as_str().to_string()).await
    }

    /// Which screen to open on launch
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the store cannot be read.
    pub async fn landing(&self) -> SessionResult<Landing> {
        if self.token().await?.is_some() {
            Ok(Landing::Dashboard)
        } else if self.has_completed_onboarding().await? {
            Ok(Landing::Login)
        } else {
            Ok(Landing::Onboarding)
        }
    }
}
