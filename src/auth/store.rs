// backend/src/auth/store.rs
//
// Dashboard accounts, persisted as a JSON object keyed by username.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::password::{dummy_hash, hash_password, verify_password};
use super::Role;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("user '{0}' already exists")]
    UserExists(String),
    #[error("username cannot be blank")]
    BlankUsername,
    #[error("password cannot be blank")]
    BlankPassword,
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential file is malformed: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("password check was interrupted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A stored account without its hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<StoredUser>, AuthError>;

    async fn list(&self) -> Result<Vec<UserSummary>, AuthError>;

    /// Fails with `UserExists` instead of overwriting.
    async fn insert(&self, username: String, user: StoredUser) -> Result<(), AuthError>;
}

pub struct JsonFileCredentialStore {
    path: PathBuf,
    users: RwLock<BTreeMap<String, StoredUser>>,
}

impl JsonFileCredentialStore {
    /// A missing file is an empty store; it is created on first insert.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref().to_path_buf();
        let users = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "credential file not found, starting empty");
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        info!(path = %path.display(), users = users.len(), "credential store loaded");

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    async fn persist(&self, users: &BTreeMap<String, StoredUser>) -> Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(users)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn find(&self, username: &str) -> Result<Option<StoredUser>, AuthError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn list(&self) -> Result<Vec<UserSummary>, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .map(|(username, user)| UserSummary {
                username: username.clone(),
                role: user.role,
                created_at: user.created_at,
            })
            .collect())
    }

    async fn insert(&self, username: String, user: StoredUser) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        if users.contains_key(&username) {
            return Err(AuthError::UserExists(username));
        }
        users.insert(username.clone(), user);
        if let Err(err) = self.persist(&users).await {
            users.remove(&username);
            return Err(err);
        }
        info!(%username, "user added");
        Ok(())
    }
}

/// Hashes and stores a new account.
pub async fn create_user(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
    role: Role,
) -> Result<UserSummary, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::BlankUsername);
    }
    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = StoredUser {
        password_hash,
        role,
        created_at: Utc::now(),
    };
    let summary = UserSummary {
        username: username.to_string(),
        role: user.role,
        created_at: user.created_at,
    };
    store.insert(username.to_string(), user).await?;
    Ok(summary)
}

/// Unknown users and wrong passwords are indistinguishable to the caller.
pub async fn authenticate(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<Role, AuthError> {
    let user = store.find(username.trim()).await?;
    let password = password.to_string();
    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => dummy_hash().to_string(),
    };
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
    match user {
        Some(user) if valid => Ok(user.role),
        _ => Err(AuthError::InvalidCredentials),
    }
}

/// Seeds an `admin` account when the store holds no users at all.
pub async fn ensure_bootstrap_admin(
    store: &dyn CredentialStore,
    password: Option<&str>,
) -> Result<bool, AuthError> {
    if !store.list().await?.is_empty() {
        return Ok(false);
    }
    let Some(password) = password else {
        warn!("credential store is empty and no bootstrap admin password is configured");
        return Ok(false);
    };
    create_user(store, "admin", password, Role::Admin).await?;
    info!("bootstrap admin account created");
    Ok(true)
}
