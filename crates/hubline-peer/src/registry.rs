use std::collections::HashMap;

use hubline_transport::ConnectionId;

use crate::connection::ConnectionHandle;
use crate::error::{PeerError, Result};

/// Live connections keyed by id.
///
/// Owned by a single task; insert on accept, remove on close or error.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    handles: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. Fails if its id is already present.
    pub fn insert(&mut self, handle: ConnectionHandle) -> Result<()> {
        let id = handle.id();
        if self.handles.contains_key(&id) {
            return Err(PeerError::DuplicateId(id));
        }
        self.handles.insert(id, handle);
        Ok(())
    }

    /// Remove a handle; absent ids are a no-op.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.handles.remove(&id)
    }

    pub fn lookup(&self, id: ConnectionId) -> Result<&ConnectionHandle> {
        self.handles.get(&id).ok_or(PeerError::NotFound(id))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Snapshot of every handle at call time.
    ///
    /// The iterator owns its handles, so the registry can change while it is
    /// being walked without affecting it.
    pub fn all(&self) -> std::vec::IntoIter<ConnectionHandle> {
        self.handles.values().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.handles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove and return every handle.
    pub fn drain(&mut self) -> Vec<ConnectionHandle> {
        self.handles.drain().map(|(_, handle)| handle).collect()
    }
}
