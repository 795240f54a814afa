//! Idle-expiring storage for saved sessions.

use super::SavedSession;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::debug;

/// Where saved sessions live between runs.
///
/// Implementations decide their own expiry policy.
pub trait SessionStore {
    fn load(&self, username: &str) -> Option<SavedSession>;
    fn save(&self, username: &str, session: SavedSession);
    fn invalidate(&self, username: &str);
}

/// A store key derived from the username.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionKey(String);

impl SessionKey {
    /// Hashes the username so it is not kept in memory verbatim.
    pub fn from_username(username: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(username.trim().to_ascii_uppercase().as_bytes());
        let result = hasher.finalize();
        let hash = hex::encode(&result[..16]);
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...", &self.0[..8.min(self.0.len())])
    }
}

struct StoredSession {
    session: SavedSession,
    last_used: Instant,
}

/// In-memory store that forgets sessions after a period of inactivity.
pub struct MemorySessionStore {
    entries: DashMap<SessionKey, StoredSession>,
    idle_ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_ttl,
        }
    }

    /// The portal drops sessions after roughly 30 minutes of inactivity.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes entries that have been idle for longer than the TTL.
    pub fn cleanup_expired(&self) {
        self.entries
            .retain(|_, entry| entry.last_used.elapsed() < self.idle_ttl);
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}

impl SessionStore for MemorySessionStore {
    /// Returns the session and refreshes its idle timer.
    fn load(&self, username: &str) -> Option<SavedSession> {
        let key = SessionKey::from_username(username);
        let mut entry = self.entries.get_mut(&key)?;
        if entry.last_used.elapsed() >= self.idle_ttl {
            drop(entry);
            self.entries.remove(&key);
            debug!(session = %key, "Saved session expired");
            return None;
        }
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    fn save(&self, username: &str, session: SavedSession) {
        let key = SessionKey::from_username(username);
        debug!(session = %key, "Saving session");
        self.entries.insert(
            key,
            StoredSession {
                session,
                last_used: Instant::now(),
            },
        );
    }

    fn invalidate(&self, username: &str) {
        self.entries.remove(&SessionKey::from_username(username));
    }
}
