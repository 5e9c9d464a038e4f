//! Session persistence: the access token, refresh token and user descriptor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use storage::Storage;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_KEY: &str = "refresh";
pub const USER_KEY: &str = "user";

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Value,
}

/// Emitted after every successful `set`/`clear`. Delivery is best-effort:
/// receivers that subscribe later or lag behind miss earlier changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    SignedIn { user: Value },
    SignedOut,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session(&self) -> Result<Option<Session>>;
    async fn set(&self, token: &str, refresh_token: Option<&str>, user: &Value) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    async fn get(&self) -> Result<Option<String>> {
        Ok(self.session().await?.map(|session| session.access_token))
    }
}

pub struct MemorySessionStore {
    current: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::starting_with(None)
    }

    pub fn with_session(session: Session) -> Self {
        Self::starting_with(Some(session))
    }

    fn starting_with(session: Option<Session>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(session),
            changes,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn session(&self) -> Result<Option<Session>> {
        Ok(self.current.read().await.clone())
    }

    async fn set(&self, token: &str, refresh_token: Option<&str>, user: &Value) -> Result<()> {
        *self.current.write().await = Some(Session {
            access_token: token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            user: user.clone(),
        });
        let _ = self.changes.send(SessionChange::SignedIn { user: user.clone() });
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.current.write().await.take();
        let _ = self.changes.send(SessionChange::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

/// Session store backed by the on-disk key-value table, keyed under
/// [`TOKEN_KEY`], [`REFRESH_KEY`] and [`USER_KEY`].
pub struct DurableSessionStore {
    store: Storage,
    changes: broadcast::Sender<SessionChange>,
}

impl DurableSessionStore {
    pub async fn initialize(database_url: &str) -> Result<Self> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize session storage at '{database_url}'"))?;
        Ok(Self::from_storage(store))
    }

    pub fn from_storage(store: Storage) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { store, changes }
    }
}

#[async_trait]
impl SessionStore for DurableSessionStore {
    async fn session(&self) -> Result<Option<Session>> {
        let Some(access_token) = self.store.get_item(TOKEN_KEY).await? else {
            return Ok(None);
        };
        let refresh_token = self.store.get_item(REFRESH_KEY).await?;
        let user = match self.store.get_item(USER_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            None => Value::Null,
        };
        Ok(Some(Session {
            access_token,
            refresh_token,
            user,
        }))
    }

    async fn set(&self, token: &str, refresh_token: Option<&str>, user: &Value) -> Result<()> {
        let user_json = serde_json::to_string(user).context("failed to encode user descriptor")?;
        match refresh_token {
            Some(refresh) => {
                self.store
                    .set_items(&[(TOKEN_KEY, token), (REFRESH_KEY, refresh), (USER_KEY, &user_json)])
                    .await?
            }
            None => {
                self.store
                    .set_items(&[(TOKEN_KEY, token), (USER_KEY, &user_json)])
                    .await?;
                self.store.remove_item(REFRESH_KEY).await?;
            }
        }
        info!("session: stored new session");
        let _ = self.changes.send(SessionChange::SignedIn { user: user.clone() });
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.store
            .clear_items(&[TOKEN_KEY, REFRESH_KEY, USER_KEY])
            .await?;
        debug!("session: cleared");
        let _ = self.changes.send(SessionChange::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
