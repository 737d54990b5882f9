//! Session and Connectivity Signals
//!
//! Thin interfaces to the two external collaborators the engine reacts to:
//! the auth module's bearer token (with its login/logout lifecycle) and the
//! connectivity module's connected flag. Both are plain `watch` pairs; the
//! engine only ever observes them, never inspects beyond the current value.

use tokio::sync::watch;

/// Current bearer token, updated on login/logout.
///
/// The engine treats the token as read-only: a non-empty token appearing
/// brings the session up, the token clearing tears it down.
#[derive(Debug)]
pub struct SessionSignal {
    tx: watch::Sender<Option<String>>,
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignal {
    /// Create a signal with no active session
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Publish a fresh token (login)
    pub fn set_token(&self, token: impl Into<String>) {
        self.tx.send_replace(Some(token.into()));
    }

    /// Clear the token (logout)
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Current token, if any
    pub fn token(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Subscribe to token changes
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

/// Connectivity flag, used purely as a trigger.
#[derive(Debug)]
pub struct ConnectivitySignal {
    tx: watch::Sender<bool>,
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ConnectivitySignal {
    /// Create a signal with the given initial state
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Publish a connectivity transition
    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }

    /// Current state
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to connectivity transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
