//! Cancellation registry
//!
//! Tracks in-flight invocations by id and lets any of them be cooperatively
//! stopped. Ids are minted per invocation, so at most one build runs under a
//! given id by construction.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::request::InvocationId;

/// Map from invocation id to a stop-capable handle
#[derive(Debug, Default)]
pub struct BuildStopper {
    tokens: Mutex<HashMap<InvocationId, CancellationToken>>,
}

impl BuildStopper {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for an invocation.
    ///
    /// Registering a duplicate id is a programming error: ids are minted
    /// per invocation attempt.
    pub fn register(&self, id: InvocationId) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self.tokens.lock().unwrap().insert(id, token.clone());
        debug_assert!(previous.is_none(), "invocation id registered twice: {id}");
        token
    }

    /// Whether an invocation is currently registered
    pub fn contains(&self, id: InvocationId) -> bool {
        self.tokens.lock().unwrap().contains_key(&id)
    }

    /// Request a cooperative stop.
    ///
    /// Idempotent; returns whether anything was registered under the id.
    pub fn stop(&self, id: InvocationId) -> bool {
        match self.tokens.lock().unwrap().get(&id) {
            Some(token) => {
                debug!(%id, "stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Request a cooperative stop of every registered invocation
    pub fn stop_all(&self) {
        for (id, token) in self.tokens.lock().unwrap().iter() {
            debug!(id = %id, "stop requested");
            token.cancel();
        }
    }

    /// Remove an invocation's token once it has drained
    pub fn remove(&self, id: InvocationId) {
        self.tokens.lock().unwrap().remove(&id);
    }

    /// Whether any invocation is still registered
    pub fn has_active(&self) -> bool {
        !self.tokens.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_stop() {
        let stopper = BuildStopper::new();
        let id = InvocationId::mint();
        let token = stopper.register(id);

        assert!(stopper.contains(id));
        assert!(!token.is_cancelled());

        assert!(stopper.stop(id));
        assert!(token.is_cancelled());
        // A second stop is a no-op that still reports the registration.
        assert!(stopper.stop(id));
    }

    #[test]
    fn test_stop_unknown_id_reports_not_found() {
        let stopper = BuildStopper::new();
        assert!(!stopper.stop(InvocationId::mint()));
    }

    #[test]
    fn test_remove_clears_registration() {
        let stopper = BuildStopper::new();
        let id = InvocationId::mint();
        stopper.register(id);
        assert!(stopper.has_active());

        stopper.remove(id);
        assert!(!stopper.contains(id));
        assert!(!stopper.has_active());
        assert!(!stopper.stop(id));
    }

    #[test]
    fn test_stop_all_cancels_every_token() {
        let stopper = BuildStopper::new();
        let first = stopper.register(InvocationId::mint());
        let second = stopper.register(InvocationId::mint());

        stopper.stop_all();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
    }
}
