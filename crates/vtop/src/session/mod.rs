//! Session state for one portal login.

mod store;

pub use store::{MemorySessionStore, SessionKey, SessionStore};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cookie, CSRF token and subject of the current session.
///
/// Owned by [`crate::VtopClient`]; everything else sees a [`SessionSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub cookie_header: Option<String>,
    pub csrf_token: Option<String>,
    pub subject_id: Option<String>,
    pub authenticated: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Replaces the cookie header with the one returned by the transport.
    pub(crate) fn merge_cookies(&mut self, cookie_header: Option<String>) {
        if cookie_header.is_some() {
            self.cookie_header = cookie_header;
        }
    }

    /// Takes a read-only copy of the fields a request needs.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            cookie_header: self.cookie_header.clone(),
            csrf_token: self.csrf_token.clone().unwrap_or_default(),
            subject_id: self.subject_id.clone().unwrap_or_default(),
        }
    }

    /// The persistable triple, if the session is authenticated.
    pub fn to_saved(&self) -> Option<SavedSession> {
        if !self.authenticated {
            return None;
        }
        Some(SavedSession {
            cookie_header: self.cookie_header.clone().unwrap_or_default(),
            csrf_token: self.csrf_token.clone()?,
            subject_id: self.subject_id.clone()?,
        })
    }

    /// Rebuilds an authenticated state from a saved triple.
    pub fn from_saved(saved: SavedSession) -> Self {
        Self {
            cookie_header: Some(saved.cookie_header).filter(|c| !c.is_empty()),
            csrf_token: Some(saved.csrf_token),
            subject_id: Some(saved.subject_id),
            authenticated: true,
        }
    }
}

/// Values copied out of [`SessionState`] at the start of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub cookie_header: Option<String>,
    pub csrf_token: String,
    pub subject_id: String,
}

/// What gets persisted between runs so a fresh login can be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub cookie_header: String,
    pub csrf_token: String,
    pub subject_id: String,
}

/// Cancels a running login between captcha rounds.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticated() -> SessionState {
        SessionState {
            cookie_header: Some("JSESSIONID=abc".to_string()),
            csrf_token: Some("tok".to_string()),
            subject_id: Some("21BCE0001".to_string()),
            authenticated: true,
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = authenticated();
        state.reset();
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn test_saved_round_trip() {
        let state = authenticated();
        let saved = state.to_saved().unwrap();
        assert_eq!(SessionState::from_saved(saved), state);
    }

    #[test]
    fn test_unauthenticated_has_nothing_to_save() {
        let mut state = authenticated();
        state.authenticated = false;
        assert_eq!(state.to_saved(), None);
    }

    #[test]
    fn test_merge_keeps_existing_when_none() {
        let mut state = authenticated();
        state.merge_cookies(None);
        assert_eq!(state.cookie_header.as_deref(), Some("JSESSIONID=abc"));
        state.merge_cookies(Some("JSESSIONID=new".to_string()));
        assert_eq!(state.cookie_header.as_deref(), Some("JSESSIONID=new"));
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }
}
