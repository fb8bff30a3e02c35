//! Session store: the single owner of the signed-in credentials.
//!
//! Durable storage is the source of truth across restarts; the in-memory
//! session is a cache of it, read once when the store is opened.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::gateway::AuthApi;
use crate::storage::{TokenStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USERNAME_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Signed-in credentials. A session always carries an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub identity: Identity,
}

pub struct SessionStore<S: TokenStorage> {
    storage: S,
    session: Option<Session>,
}

impl<S: TokenStorage> SessionStore<S> {
    /// Open the store, restoring whatever session `storage` holds.
    pub fn open(storage: S) -> Result<Self> {
        let session = read_session(&storage)?;
        Ok(Self { storage, session })
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Persist the new credentials, then publish them in memory.
    ///
    /// If storage rejects the write, the previous session stays in effect
    /// (in memory and, best effort, on disk).
    pub fn login(&mut self, access_token: &str, refresh_token: &str, username: &str) -> Result<()> {
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: Some(refresh_token.to_string()),
            identity: Identity {
                username: username.to_string(),
            },
        };

        if let Err(e) = write_session(&mut self.storage, &session) {
            let restored = match &self.session {
                Some(previous) => write_session(&mut self.storage, previous),
                None => self.storage.clear(),
            };
            if let Err(restore_err) = restored {
                warn!(error = %restore_err, "could not restore stored session after failed login");
            }
            return Err(e.context("persist session"));
        }

        info!(username, "signed in");
        self.session = Some(session);
        Ok(())
    }

    /// Sign out. The server-side blacklist call is best effort; local
    /// credentials are cleared no matter how it goes.
    ///
    /// Durable storage is cleared outright, so a corrupt store does not keep
    /// credentials alive. The only error returned is a failure to delete it,
    /// and even then the in-memory session is already gone.
    pub async fn logout<A: AuthApi + ?Sized>(&mut self, api: &A) -> Result<()> {
        if let Some(session) = self.session.take() {
            if let Some(refresh) = &session.refresh_token {
                match api.logout(&session.access_token, refresh).await {
                    Ok(()) => info!(username = %session.identity.username, "refresh token blacklisted"),
                    Err(e) => warn!(error = %e, "logout request failed; clearing local session anyway"),
                }
            }
        }
        self.storage.clear().context("clear stored session")
    }
}

fn read_session<S: TokenStorage>(storage: &S) -> Result<Option<Session>> {
    let Some(access_token) = storage.get(ACCESS_TOKEN_KEY)? else {
        return Ok(None);
    };
    let Some(username) = storage.get(USERNAME_KEY)? else {
        warn!("stored access token has no username; ignoring it");
        return Ok(None);
    };
    Ok(Some(Session {
        access_token,
        refresh_token: storage.get(REFRESH_TOKEN_KEY)?,
        identity: Identity { username },
    }))
}

fn write_session<S: TokenStorage>(storage: &mut S, session: &Session) -> Result<()> {
    storage.set(ACCESS_TOKEN_KEY, &session.access_token)?;
    match &session.refresh_token {
        Some(refresh) => storage.set(REFRESH_TOKEN_KEY, refresh)?,
        None => storage.remove(REFRESH_TOKEN_KEY)?,
    }
    storage.set(USERNAME_KEY, &session.identity.username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::gateway::{Credentials, Registration, TokenPair};
    use crate::storage::{FileStorage, MemoryStorage};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Records logout calls; optionally fails them.
    #[derive(Default)]
    struct FakeAuth {
        fail_logout: bool,
        logouts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn login(&self, _: &Credentials) -> Result<TokenPair, ApiError> {
            unreachable!("not used by the session store")
        }

        async fn register(&self, _: &Registration) -> Result<(), ApiError> {
            unreachable!("not used by the session store")
        }

        async fn logout(&self, access: &str, refresh: &str) -> Result<(), ApiError> {
            self.logouts
                .lock()
                .unwrap()
                .push((access.to_string(), refresh.to_string()));
            if self.fail_logout {
                return Err(ApiError::Status {
                    url: "http://test/api/auth/logout/".to_string(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    /// Storage that refuses every write.
    struct ReadOnlyStorage(MemoryStorage);

    impl TokenStorage for ReadOnlyStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key)
        }
        fn set(&mut self, _: &str, _: &str) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn remove(&mut self, _: &str) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn clear(&mut self) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn signed_in() -> SessionStore<MemoryStorage> {
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();
        store.login("acc-1", "ref-1", "sam").unwrap();
        store
    }

    #[test]
    fn test_login_persists_and_publishes() {
        let store = signed_in();
        let s = store.current().unwrap();
        assert_eq!(s.access_token, "acc-1");
        assert_eq!(s.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(s.identity.username, "sam");
        assert_eq!(
            store.storage().get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("acc-1")
        );
        assert_eq!(
            store.storage().get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("ref-1")
        );
    }

    #[test]
    fn test_open_restores_from_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut first = SessionStore::open(FileStorage::new(&path)).unwrap();
        assert!(first.current().is_none());
        first.login("acc-9", "ref-9", "kim").unwrap();

        let second = SessionStore::open(FileStorage::new(&path)).unwrap();
        assert_eq!(second.current(), first.current());
        assert_eq!(second.access_token(), Some("acc-9"));
    }

    #[test]
    fn test_token_without_username_is_no_session() {
        let mut storage = MemoryStorage::new();
        storage.set(ACCESS_TOKEN_KEY, "orphan").unwrap();
        let store = SessionStore::open(storage).unwrap();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_failed_login_keeps_previous_session() {
        let mut storage = MemoryStorage::new();
        storage.set(ACCESS_TOKEN_KEY, "old").unwrap();
        storage.set(USERNAME_KEY, "sam").unwrap();
        let mut store = SessionStore::open(ReadOnlyStorage(storage)).unwrap();

        assert!(store.login("new", "r", "sam").is_err());
        assert_eq!(store.access_token(), Some("old"));
    }

    #[tokio::test]
    async fn test_logout_blacklists_and_clears() {
        let api = FakeAuth::default();
        let mut store = signed_in();

        store.logout(&api).await.unwrap();

        assert!(store.current().is_none());
        assert!(store.storage().is_empty());
        assert_eq!(
            *api.logouts.lock().unwrap(),
            vec![("acc-1".to_string(), "ref-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let api = FakeAuth {
            fail_logout: true,
            ..Default::default()
        };
        let mut store = signed_in();

        store.logout(&api).await.unwrap();

        assert!(store.current().is_none());
        assert!(store.storage().is_empty());
        assert_eq!(api.logouts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_removes_corrupt_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
        store.login("acc-1", "ref-1", "sam").unwrap();
        std::fs::write(&path, "garbage").unwrap();

        let api = FakeAuth::default();
        store.logout(&api).await.unwrap();

        assert!(store.current().is_none());
        assert!(!path.exists());
        assert_eq!(api.logouts.lock().unwrap().len(), 1);
        assert!(SessionStore::open(FileStorage::new(&path)).unwrap().current().is_none());
    }

    #[tokio::test]
    async fn test_logout_without_session_skips_server() {
        let api = FakeAuth::default();
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();

        store.logout(&api).await.unwrap();

        assert!(store.current().is_none());
        assert!(api.logouts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_storage_failure_still_drops_memory() {
        let mut storage = MemoryStorage::new();
        storage.set(ACCESS_TOKEN_KEY, "acc").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "ref").unwrap();
        storage.set(USERNAME_KEY, "sam").unwrap();
        let mut store = SessionStore::open(ReadOnlyStorage(storage)).unwrap();

        let api = FakeAuth::default();
        assert!(store.logout(&api).await.is_err());
        assert!(store.current().is_none());
    }
}
