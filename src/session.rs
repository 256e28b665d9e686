//! Token cache.
//!
//! A [`Session`] holds the current token and its expiry. Expiry is checked
//! lazily when the token is about to be used; nothing clears it on a timer.
//! [`TokenStore`] is the shared, lock-protected home of the one session a
//! client owns.

use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Current token and its expiry
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session seeded with a token obtained elsewhere
    pub fn with_token(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: Some(token.into()),
            expires_at,
        }
    }

    /// True iff a token is present and has not expired at `now`.
    ///
    /// A token whose expiry equals `now` is already expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expires_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(expires_at)) => expires_at > now,
        }
    }

    /// The token, if it is still valid at `now`
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.is_valid(now) {
            self.token.as_deref()
        } else {
            None
        }
    }

    pub fn set(&mut self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        self.token = Some(token.into());
        self.expires_at = expires_at;
    }

    pub fn clear(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Shared holder of a client's [`Session`].
///
/// All writes go through [`TokenStore::set`] and [`TokenStore::clear`].
#[derive(Debug, Default)]
pub struct TokenStore {
    session: RwLock<Session>,
    auth_gate: Mutex<()>,
}

impl TokenStore {
    pub fn new(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
            auth_gate: Mutex::new(()),
        }
    }

    pub async fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.session.read().await.is_valid(now)
    }

    pub async fn valid_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.session.read().await.valid_token(now).map(String::from)
    }

    pub async fn set(&self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        self.session.write().await.set(token, expires_at);
    }

    pub async fn clear(&self) {
        self.session.write().await.clear();
    }

    /// Clear the session only if it still holds `token`.
    ///
    /// Returns true when the session was cleared.
    pub async fn clear_if(&self, token: &str) -> bool {
        let mut session = self.session.write().await;
        if session.token.as_deref() == Some(token) {
            session.clear();
            true
        } else {
            false
        }
    }

    /// Copy of the current session
    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Serialises re-authentication; hold the guard across the exchange.
    pub(crate) async fn auth_gate(&self) -> MutexGuard<'_, ()> {
        self.auth_gate.lock().await
    }
}
