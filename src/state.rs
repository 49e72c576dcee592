//! Shared mutable device state
//!
//! One explicitly owned struct, injected into every component that needs it.
//! Last writer wins on every field; nothing here is versioned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Coordinates reported by the remote client (phone GPS)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// State shared between the dispatcher, loops and handlers
#[derive(Debug, Default)]
pub struct SharedState {
    last_response: Mutex<String>,
    navigation_active: AtomicBool,
    listening: AtomicBool,
    client_location: Mutex<Option<ClientLocation>>,
}

/// Reference-counted handle to [`SharedState`]
pub type SharedStateRef = Arc<SharedState>;

impl SharedState {
    /// Create an empty state behind an `Arc`
    #[must_use]
    pub fn new_shared() -> SharedStateRef {
        Arc::new(Self::default())
    }

    /// The most recent non-transient utterance, if any
    #[must_use]
    pub fn last_response(&self) -> Option<String> {
        let guard = self
            .last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_empty() {
            None
        } else {
            Some(guard.clone())
        }
    }

    /// Overwrite the last response
    pub fn set_last_response(&self, text: &str) {
        let mut guard = self
            .last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        text.clone_into(&mut guard);
    }

    #[must_use]
    pub fn navigation_active(&self) -> bool {
        self.navigation_active.load(Ordering::SeqCst)
    }

    pub fn set_navigation_active(&self, active: bool) {
        self.navigation_active.store(active, Ordering::SeqCst);
    }

    /// Atomically flip the navigation flag from idle to active
    ///
    /// Returns `false` when a session was already active.
    pub fn try_activate_navigation(&self) -> bool {
        self.navigation_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    #[must_use]
    pub fn listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Set the listening flag, returning the previous value
    pub fn set_listening(&self, listening: bool) -> bool {
        self.listening.swap(listening, Ordering::SeqCst)
    }

    #[must_use]
    pub fn client_location(&self) -> Option<ClientLocation> {
        *self
            .client_location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_client_location(&self, location: ClientLocation) {
        *self
            .client_location
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(location);
        tracing::info!(
            latitude = location.latitude,
            longitude = location.longitude,
            "client location updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_response_starts_empty() {
        let state = SharedState::default();
        assert!(state.last_response().is_none());

        state.set_last_response("hello");
        assert_eq!(state.last_response().as_deref(), Some("hello"));

        state.set_last_response("world");
        assert_eq!(state.last_response().as_deref(), Some("world"));
    }

    #[test]
    fn test_navigation_activation_is_exclusive() {
        let state = SharedState::default();
        assert!(state.try_activate_navigation());
        assert!(!state.try_activate_navigation());
        state.set_navigation_active(false);
        assert!(state.try_activate_navigation());
    }

    #[test]
    fn test_listening_swap() {
        let state = SharedState::default();
        assert!(!state.set_listening(true));
        assert!(state.listening());
        assert!(state.set_listening(false));
    }
}
