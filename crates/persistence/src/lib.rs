#![deny(warnings)]

//! Persistence layer: the local store of registered users.
//!
//! Each registered user has a password hash and the api key the simulation
//! server issued. The store is rebuilt from the server's user list at
//! startup, so [`SqliteUserStore`] can start from an empty file and the
//! in-memory [`MemoryUserStore`] is a drop-in replacement.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Returns the default SQLite URL of the user database.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/users.db"
}

/// A user allowed to log in to this front end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RegisteredUser {
    pub username: String,
    /// PHC-format password hash.
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub api_key: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl RegisteredUser {
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            api_key: api_key.into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} is already registered")]
    Duplicate(String),
    #[error("user {0} is not registered")]
    NotFound(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<RegisteredUser>, StoreError>;

    /// Insert a new user. Fails with [`StoreError::Duplicate`] if the name is taken.
    async fn create(&self, user: &RegisteredUser) -> Result<(), StoreError>;

    async fn set_api_key(&self, username: &str, api_key: &str) -> Result<(), StoreError>;

    /// All users, ordered by name.
    async fn list(&self) -> Result<Vec<RegisteredUser>, StoreError>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS registered_users (
    username TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    api_key TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
)";

/// Open (creating if needed) the database at `url` and ensure the schema exists.
pub async fn init_db(url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // An in-memory database lives only as long as its connection.
    let in_memory = url.contains(":memory:");
    let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }
    let pool = pool_options.connect_with(options).await?;
    sqlx::query(SCHEMA).execute(&pool).await?;
    debug!(url, "user database ready");
    Ok(pool)
}

/// File path behind a `sqlite:` URL, if it names a file.
pub fn sqlite_path(url: &str) -> Option<&Path> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Open the store at `url`. With `fresh`, an existing database file is
    /// removed first.
    pub async fn open(url: &str, fresh: bool) -> Result<Self, StoreError> {
        if let Some(path) = sqlite_path(url) {
            if fresh && path.exists() {
                info!(path = %path.display(), "removing previous user database");
                std::fs::remove_file(path)?;
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            pool: init_db(url).await?,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find(&self, username: &str) -> Result<Option<RegisteredUser>, StoreError> {
        let user = sqlx::query_as::<_, RegisteredUser>(
            "SELECT username, password_hash, api_key, created_at FROM registered_users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: &RegisteredUser) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO registered_users (username, password_hash, api_key, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.api_key)
        .bind(&user.created_at)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(user.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_api_key(&self, username: &str, api_key: &str) -> Result<(), StoreError> {
        let done = sqlx::query("UPDATE registered_users SET api_key = ? WHERE username = ?")
            .bind(api_key)
            .bind(username)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(username.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RegisteredUser>, StoreError> {
        let users = sqlx::query_as::<_, RegisteredUser>(
            "SELECT username, password_hash, api_key, created_at FROM registered_users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

/// Store that lives in process memory only.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<String, RegisteredUser>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, username: &str) -> Result<Option<RegisteredUser>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, user: &RegisteredUser) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Duplicate(user.username.clone()));
        }
        users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn set_api_key(&self, username: &str, api_key: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?;
        user.api_key = api_key.to_string();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RegisteredUser>, StoreError> {
        Ok(self.users.read().await.values().cloned().collect())
    }
}
