//! Bearer-credential ownership and the 401 recovery policy.
//!
//! The backend issues a JWT on login and offers no refresh endpoint, so a
//! renewal is simply a fresh login with the stored identity. [`AuthGate`]
//! owns the live token, persists it (plus the identity needed to renew)
//! through a [`CredentialStore`], and wraps every authenticated call in
//! [`AuthGate::with_auth`]: one re-authentication and one retry on a 401,
//! never more. That bounds the worst case to two round trips per logical
//! call and rules out retry loops on a persistently rejected credential.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Opaque bearer token. Redacted in debug output so tokens never land in
/// logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(…{} bytes)", self.0.len())
    }
}

/// The contact/password pair the backend authenticates.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub contact: String,
    pub password: String,
}

impl Identity {
    pub fn new(contact: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            contact: contact.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("contact", &self.contact)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What survives a restart: the token plus the identity used to renew it.
///
/// The backend has no refresh-token flow, so renewal re-sends the original
/// secret; both live together under one well-known storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub jwt: BearerToken,
    pub contact: String,
    pub password: String,
}

impl StoredSession {
    fn identity(&self) -> Identity {
        Identity::new(self.contact.clone(), self.password.clone())
    }
}

/// Durable client-side storage boundary for the session record.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>, ClientError>;
    fn save(&self, session: &StoredSession) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON file under the user config directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arys")
            .join("credentials.json")
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>, ClientError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(&self.path)?;
        let session = serde_json::from_slice(&raw).map_err(|e| ClientError::Parse {
            context: format!("credential file {}", self.path.display()),
            detail: e.to_string(),
        })?;
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(session).map_err(|e| ClientError::Parse {
            context: "credential serialization".into(),
            detail: e.to_string(),
        })?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<StoredSession>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>, ClientError> {
        Ok(self.inner.lock().expect("store lock poisoned").clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), ClientError> {
        *self.inner.lock().expect("store lock poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.inner.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}

/// Exchange an identity for a bearer token at the identity endpoint.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn log_in(&self, identity: &Identity) -> Result<BearerToken, ClientError>;
}

struct SessionState {
    token: Option<BearerToken>,
    identity: Option<Identity>,
    /// Bumped on every successful renewal; lets a caller that queued behind
    /// an in-flight renewal reuse its result instead of logging in again.
    generation: u64,
}

/// Owner of the session credential and the single-retry policy around it.
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
    store: Arc<dyn CredentialStore>,
    session: Mutex<SessionState>,
    renew_lock: tokio::sync::Mutex<()>,
}

impl AuthGate {
    /// Build a gate, hydrating any persisted session. A corrupt or
    /// unreadable credential file degrades to a logged-out gate.
    pub fn new(authenticator: Arc<dyn Authenticator>, store: Arc<dyn CredentialStore>) -> Self {
        let persisted = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not read persisted session, starting logged out");
            None
        });
        let session = match persisted {
            Some(s) => SessionState {
                identity: Some(s.identity()),
                token: Some(s.jwt),
                generation: 0,
            },
            None => SessionState {
                token: None,
                identity: None,
                generation: 0,
            },
        };
        Self {
            authenticator,
            store,
            session: Mutex::new(session),
            renew_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The in-memory token, if any.
    pub fn current(&self) -> Option<BearerToken> {
        self.session
            .lock()
            .expect("session lock poisoned")
            .token
            .clone()
    }

    /// Authenticate against the identity endpoint and adopt the result.
    /// Failure leaves the prior session untouched.
    pub async fn log_in(&self, identity: Identity) -> Result<BearerToken, ClientError> {
        let token = self
            .authenticator
            .log_in(&identity)
            .await
            .map_err(|e| match e {
                auth @ ClientError::Auth { .. } => auth,
                other => ClientError::Auth {
                    detail: other.to_string(),
                },
            })?;
        self.adopt(identity, token.clone());
        Ok(token)
    }

    /// Drop the session from memory and durable storage.
    pub fn log_out(&self) -> Result<(), ClientError> {
        {
            let mut s = self.session.lock().expect("session lock poisoned");
            s.token = None;
            s.identity = None;
            s.generation += 1;
        }
        self.store.clear()
    }

    /// Run `call` with a valid token, authenticating first if none is held.
    ///
    /// On an unauthorized result: exactly one re-authentication, exactly one
    /// retry. A second failure of any kind propagates unmodified; a failed
    /// re-authentication propagates as [`ClientError::Auth`] without
    /// retrying `call`.
    pub async fn with_auth<T, F, Fut>(&self, call: F) -> Result<T, ClientError>
    where
        F: Fn(BearerToken) -> Fut,
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        let (held, generation) = {
            let s = self.session.lock().expect("session lock poisoned");
            (s.token.clone(), s.generation)
        };
        let (token, generation) = match held {
            Some(t) => (t, generation),
            None => {
                let t = self.renew(generation).await?;
                let g = self
                    .session
                    .lock()
                    .expect("session lock poisoned")
                    .generation;
                (t, g)
            }
        };

        match call(token).await {
            Err(e) if e.is_unauthorized() => {
                debug!(error = %e, "request unauthorized, renewing token for one retry");
                let fresh = self.renew(generation).await?;
                call(fresh).await
            }
            other => other,
        }
    }

    /// Re-authenticate with the stored identity.
    ///
    /// Renewals are serialized: concurrent 401s queue behind one in-flight
    /// login, and a caller that waited reuses the fresh token when the
    /// generation advanced past the one it observed.
    async fn renew(&self, observed_generation: u64) -> Result<BearerToken, ClientError> {
        let _guard = self.renew_lock.lock().await;

        let identity = {
            let s = self.session.lock().expect("session lock poisoned");
            if s.generation != observed_generation {
                if let Some(token) = &s.token {
                    debug!("reusing token renewed by a concurrent request");
                    return Ok(token.clone());
                }
            }
            s.identity.clone()
        };
        let identity = identity.ok_or_else(|| ClientError::Auth {
            detail: "no stored identity to renew the session".into(),
        })?;

        let token = self
            .authenticator
            .log_in(&identity)
            .await
            .map_err(|e| ClientError::Auth {
                detail: format!("token renewal failed: {e}"),
            })?;
        self.adopt(identity, token.clone());
        Ok(token)
    }

    fn adopt(&self, identity: Identity, token: BearerToken) {
        {
            let mut s = self.session.lock().expect("session lock poisoned");
            s.token = Some(token.clone());
            s.identity = Some(identity.clone());
            s.generation += 1;
        }
        let record = StoredSession {
            jwt: token,
            contact: identity.contact,
            password: identity.password,
        };
        if let Err(e) = self.store.save(&record) {
            // The in-memory session stays valid; only restart continuity
            // is lost.
            warn!(error = %e, "could not persist session");
        }
    }
}
