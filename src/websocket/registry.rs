//! Connection Registry
//!
//! The set of registered sessions. Owned by the dispatcher and only ever
//! touched from its control loop, so it needs no locking.

use std::collections::HashMap;

use super::hub::HubError;
use super::session::{SessionHandle, SessionId};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<SessionId, SessionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session; an identity may only be present once
    pub fn add(&mut self, handle: SessionHandle) -> Result<(), HubError> {
        let id = handle.id();
        if self.sessions.contains_key(&id) {
            return Err(HubError::DuplicateSession(id));
        }

        self.sessions.insert(id, handle);
        Ok(())
    }

    /// Remove a session. Absent ids are ignored.
    pub fn remove(&mut self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.remove(id)
    }

    /// Copy of the current members, unaffected by later mutation
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.values().cloned().collect()
    }

    /// Remove and return every member
    pub fn drain(&mut self) -> Vec<SessionHandle> {
        self.sessions.drain().map(|(_, handle)| handle).collect()
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionHandle> {
        self.sessions.get(id)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::session::ClientSession;

    #[test]
    fn test_add_rejects_duplicate_identity() {
        let mut registry = ConnectionRegistry::new();
        let id = SessionId::new();
        let first = ClientSession::with_id(id, 4);
        let second = ClientSession::with_id(id, 4);

        registry.add(first.handle().clone()).unwrap();
        let result = registry.add(second.handle().clone());

        assert!(matches!(result, Err(HubError::DuplicateSession(dup)) if dup == id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let session = ClientSession::new(4);
        let id = session.id();

        registry.add(session.handle().clone()).unwrap();
        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_survives_later_mutation() {
        let mut registry = ConnectionRegistry::new();
        let a = ClientSession::new(4);
        let b = ClientSession::new(4);
        registry.add(a.handle().clone()).unwrap();
        registry.add(b.handle().clone()).unwrap();

        let snapshot = registry.snapshot();
        registry.remove(&a.id());

        assert_eq!(snapshot.len(), 2);
        assert!(!registry.contains(&a.id()));
        assert!(registry.contains(&b.id()));
    }
}
