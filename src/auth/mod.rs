// backend/src/auth/mod.rs
//
// Bearer sessions over the file-backed credential store.

pub mod password;
pub mod store;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub use store::{AuthError, CredentialStore, JsonFileCredentialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Operator,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "supervisor" => Ok(Role::Supervisor),
            "operator" | "operador" => Ok(Role::Operator),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub role: Role,
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(token_ttl_hours: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::hours(token_ttl_hours),
        }
    }

    pub async fn issue(&self, username: &str, role: Role) -> String {
        let mut buf = [0u8; 32];
        OsRng.fill_bytes(&mut buf);
        let token = URL_SAFE_NO_PAD.encode(buf);
        let expires_at = Utc::now() + self.ttl;

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            token.clone(),
            SessionEntry {
                session: Session {
                    username: username.to_string(),
                    role,
                },
                expires_at,
            },
        );
        token
    }

    /// Live sessions resolve under the read lock; an expired one is removed.
    pub async fn resolve(&self, token: &str) -> Option<Session> {
        {
            let sessions = self.sessions.read().await;
            let entry = sessions.get(token)?;
            if entry.expires_at > Utc::now() {
                return Some(entry.session.clone());
            }
        }

        // A concurrent lookup or prune may have removed it already.
        if self.sessions.write().await.remove(token).is_some() {
            debug!("expired session removed");
        }
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn prune_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "expired sessions removed");
        }
        pruned
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// The caller behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub token: String,
    pub session: Session,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<SessionManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let manager = Arc::<SessionManager>::from_ref(state);
        let token =
            bearer_token(parts).ok_or_else(|| AppError::unauthorized("Missing or invalid token"))?;
        let session = manager
            .resolve(&token)
            .await
            .ok_or_else(|| AppError::unauthorized("Missing or invalid token"))?;
        Ok(AuthUser { token, session })
    }
}

pub fn require_admin(user: &AuthUser) -> AppResult<()> {
    if user.session.role == Role::Admin {
        return Ok(());
    }
    Err(AppError::forbidden(format!(
        "user '{}' is not an administrator",
        user.session.username
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn issued_token_resolves_until_revoked() {
        let manager = SessionManager::new(12);
        let token = manager.issue("ana", Role::Supervisor).await;

        let session = manager.resolve(&token).await.unwrap();
        assert_eq!(session.username, "ana");
        assert_eq!(session.role, Role::Supervisor);

        assert!(manager.revoke(&token).await);
        assert!(manager.resolve(&token).await.is_none());
        assert!(!manager.revoke(&token).await);
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let manager = SessionManager::new(0);
        let token = manager.issue("ana", Role::Operator).await;
        assert!(manager.resolve(&token).await.is_none());
        // The failed lookup already dropped the entry.
        assert!(!manager.revoke(&token).await);

        manager.issue("bruno", Role::Operator).await;
        assert_eq!(manager.prune_expired().await, 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_the_session_map() {
        let manager = Arc::new(SessionManager::new(12));
        let token = manager.issue("ana", Role::Supervisor).await;

        // Held read guard: lookups must still complete.
        let guard = manager.sessions.read().await;
        let lookups = (0..8).map(|_| {
            let manager = manager.clone();
            let token = token.clone();
            tokio::spawn(async move { manager.resolve(&token).await })
        });
        for lookup in lookups.collect::<Vec<_>>() {
            let session = tokio::time::timeout(std::time::Duration::from_secs(5), lookup)
                .await
                .expect("lookup blocked behind a reader")
                .unwrap()
                .unwrap();
            assert_eq!(session.username, "ana");
        }
        drop(guard);
    }

    #[test]
    fn roles_parse_from_stored_names() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("operador".parse::<Role>(), Ok(Role::Operator));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn only_admins_pass_admin_check() {
        let user = |role| AuthUser {
            token: "t".into(),
            session: Session {
                username: "ana".into(),
                role,
            },
        };
        assert!(require_admin(&user(Role::Admin)).is_ok());

        let err = require_admin(&user(Role::Operator)).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(err.message.contains("ana"));
    }
}
