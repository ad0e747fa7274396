//! Server-side session storage.
//!
//! The browser only holds an opaque token (in a signed cookie); the identity and
//! pending flash notices live here. Entries expire lazily when read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id_user: i64,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Danger,
}

/// One-shot notice shown on the next rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub category: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub user: Option<SessionUser>,
    pub flashes: Vec<Flash>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.flashes.is_empty()
    }
}

/// Lifetime cap for sessions that only carry flash notices.
const ANONYMOUS_TTL: Duration = Duration::from_secs(10 * 60);

/// Session token -> (data, expires_at).
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, (SessionData, Instant)>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn create(&self, data: SessionData) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let expires = self.expiry_for(&data);
        self.inner.insert(token.clone(), (data, expires));
        token
    }

    pub fn get(&self, token: &str) -> Option<SessionData> {
        let entry = self.inner.get(token)?;
        if entry.1 > Instant::now() {
            Some(entry.0.clone())
        } else {
            drop(entry);
            self.inner.remove(token);
            None
        }
    }

    /// Overwrite the data behind `token` and push its expiry out. A token that
    /// was removed in the meantime (logout, expiry) stays removed.
    pub fn save(&self, token: &str, data: SessionData) -> bool {
        let expires = self.expiry_for(&data);
        match self.inner.get_mut(token) {
            Some(mut entry) => {
                *entry = (data, expires);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, token: &str) {
        self.inner.remove(token);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, (_, expires)| *expires > now);
        before.saturating_sub(self.inner.len())
    }

    fn expiry_for(&self, data: &SessionData) -> Instant {
        let ttl = if data.user.is_some() {
            self.ttl
        } else {
            self.ttl.min(ANONYMOUS_TTL)
        };
        Instant::now() + ttl
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}
