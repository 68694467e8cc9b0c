//! Access-token sources used to decorate outgoing requests
//!
//! Sessions are issued elsewhere (the sign-in flow lives with the backend's
//! auth provider); this module only reads them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ReplyDeskError, Result};

/// Environment variable holding a bearer token
pub const ACCESS_TOKEN_ENV: &str = "REPLY_DESK_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

/// Supplies the current session, if any
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns `Ok(None)` when signed out or the session has expired
    async fn current_session(&self) -> Result<Option<Session>>;
}

/// Fixed session, mostly useful for tests and scripted use
#[derive(Debug, Clone, Default)]
pub struct StaticSession(Option<Session>);

impl StaticSession {
    pub fn new(session: Session) -> Self {
        Self(Some(session))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.0.clone().filter(|s| !s.is_expired()))
    }
}

/// Reads the token from `REPLY_DESK_ACCESS_TOKEN` on every request
#[derive(Debug, Clone, Default)]
pub struct EnvSession;

#[async_trait]
impl SessionProvider for EnvSession {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(Session::new))
    }
}

/// Session persisted as JSON on disk
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            tracing::debug!("No session file at {:?}", self.path);
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let session: Session = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&self.path, json).await?;
        secure_token_file(&self.path).await?;
        tracing::info!("Saved session to {:?}", self.path);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            tokio::fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for FileSessionStore {
    async fn current_session(&self) -> Result<Option<Session>> {
        match self.load().await? {
            Some(session) if session.is_expired() => {
                tracing::warn!("Session in {:?} has expired", self.path);
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

/// Environment token first, then the session file
pub struct ChainedSession {
    env: EnvSession,
    file: FileSessionStore,
}

impl ChainedSession {
    pub fn new(token_file: impl Into<PathBuf>) -> Self {
        Self {
            env: EnvSession,
            file: FileSessionStore::new(token_file),
        }
    }
}

#[async_trait]
impl SessionProvider for ChainedSession {
    async fn current_session(&self) -> Result<Option<Session>> {
        if let Some(session) = self.env.current_session().await? {
            return Ok(Some(session));
        }
        self.file.current_session().await
    }
}

/// Restrict the token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

/// Parse a token given on the command line into a session
pub fn session_from_token(token: &str) -> Result<Session> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ReplyDeskError::ValidationError(
            "access token cannot be empty".to_string(),
        ));
    }
    Ok(Session::new(token))
}
