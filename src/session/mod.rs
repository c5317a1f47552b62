use std::{
    fs, io,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{Context, Result};
use tracing::warn;

use crate::client::{ApiClient, ApiError, models::User};

/// Durable storage for the single bearer token, with an in-memory
/// write-through cache so the HTTP adapter can read the current value on
/// every request. Absent is the safe default: a missing or unreadable file
/// simply means "logged out".
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
    cached: Arc<RwLock<Option<String>>>,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match fs::read_to_string(&path) {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to read persisted credential");
                None
            }
        };

        Self {
            path,
            cached: Arc::new(RwLock::new(cached)),
        }
    }

    pub fn token(&self) -> Option<String> {
        read_lock(&self.cached).clone()
    }

    pub fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create credential directory {}", parent.display())
            })?;
        }
        fs::write(&self.path, token)
            .with_context(|| format!("failed to persist credential to {}", self.path.display()))?;
        *write_lock(&self.cached) = Some(token.to_string());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        *write_lock(&self.cached) = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove credential file {}", self.path.display())
            }),
        }
    }
}

/// Local belief about the current authenticated identity.
/// `user` is only ever populated while `token` is held.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Owner of all session state. Login, registration, identity resolution and
/// logout go through here; nothing else writes the token or the user, apart
/// from the adapter's unauthorized hook which this store installs on itself.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<Session>>,
    credentials: CredentialStore,
    api: ApiClient,
}

impl SessionStore {
    pub fn new(api_base_url: &str, credentials: CredentialStore) -> Self {
        let state = Arc::new(RwLock::new(Session {
            token: credentials.token(),
            ..Session::default()
        }));

        let hook_state = Arc::clone(&state);
        let api = ApiClient::new(api_base_url, credentials.clone()).with_unauthorized_hook(
            Arc::new(move || {
                let mut session = write_lock(&hook_state);
                session.token = None;
                session.user = None;
            }),
        );

        Self {
            state,
            credentials,
            api,
        }
    }

    /// The adapter shared by every remote operation of this process.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn snapshot(&self) -> Session {
        read_lock(&self.state).clone()
    }

    /// Exchanges credentials for a token. Persists the token on success only,
    /// then resolves the identity before returning so callers can navigate on
    /// a fully settled session.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        {
            let mut session = write_lock(&self.state);
            session.is_loading = true;
            session.error = None;
        }

        match self.api.login(email, password).await {
            Ok(token) => {
                if let Err(err) = self.credentials.store(&token.access_token) {
                    warn!(?err, "failed to persist credential");
                }
                {
                    let mut session = write_lock(&self.state);
                    session.token = Some(token.access_token);
                    session.is_loading = false;
                }
                self.fetch_user().await;
                true
            }
            Err(err) => {
                let message = err.detail().unwrap_or("登录失败。").to_string();
                let mut session = write_lock(&self.state);
                session.error = Some(message);
                session.is_loading = false;
                false
            }
        }
    }

    /// Creates an account without authenticating it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> bool {
        {
            let mut session = write_lock(&self.state);
            session.is_loading = true;
            session.error = None;
        }

        match self.api.register(email, password, first_name, last_name).await {
            Ok(_) => {
                write_lock(&self.state).is_loading = false;
                true
            }
            Err(err) => {
                let message = err.detail().unwrap_or("注册失败。").to_string();
                let mut session = write_lock(&self.state);
                session.error = Some(message);
                session.is_loading = false;
                false
            }
        }
    }

    /// Resolves the authenticated identity for the held token. Any failure is
    /// treated as session invalidation: this is the self-healing path for a
    /// token that expired or was revoked server-side.
    pub async fn fetch_user(&self) {
        if read_lock(&self.state).token.is_none() {
            return;
        }

        write_lock(&self.state).is_loading = true;

        match self.api.current_user().await {
            Ok(user) => {
                let mut session = write_lock(&self.state);
                session.user = Some(user);
                session.is_loading = false;
            }
            Err(err) => {
                if !matches!(err, ApiError::Unauthorized) {
                    warn!(?err, "identity fetch failed, invalidating session");
                }
                write_lock(&self.state).is_loading = false;
                self.teardown();
            }
        }
    }

    /// Clears the persisted credential and the in-memory session. Idempotent.
    pub fn logout(&self) {
        self.teardown();
    }

    pub fn teardown(&self) {
        if let Err(err) = self.credentials.clear() {
            warn!(?err, "failed to remove persisted credential during teardown");
        }
        let mut session = write_lock(&self.state);
        session.token = None;
        session.user = None;
    }

    /// Resets the surfaced error; called by pages after rendering it once.
    pub fn clear_error(&self) {
        write_lock(&self.state).error = None;
    }

    #[cfg(test)]
    pub fn seed_for_tests(&self, token: &str, user: Option<User>) {
        let mut session = write_lock(&self.state);
        session.token = Some(token.to_string());
        session.user = user;
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
