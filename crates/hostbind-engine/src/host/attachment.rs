//! Attachment access cache
//!
//! One `ArchitectureAccess` per connection handle, created on the first
//! connect notification and removed on disconnect.

use std::sync::Arc;

use hostbind_sdk::{ArchitectureAccess, ConnectionId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Connection handle to access object, at most one entry per handle
#[derive(Default)]
pub struct AttachmentCache {
    entries: Mutex<FxHashMap<ConnectionId, Arc<dyn ArchitectureAccess>>>,
}

impl AttachmentCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached access for `id`, creating it with `create` if absent
    pub fn get_or_create<F>(&self, id: ConnectionId, create: F) -> Arc<dyn ArchitectureAccess>
    where
        F: FnOnce() -> Arc<dyn ArchitectureAccess>,
    {
        self.entries.lock().entry(id).or_insert_with(create).clone()
    }

    /// Remove and return the access for `id`
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<dyn ArchitectureAccess>> {
        self.entries.lock().remove(&id)
    }

    /// Check if `id` has an access object
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Number of cached access objects
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// No cached access objects
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for AttachmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_sdk::Value;

    struct Access(u64);

    impl ArchitectureAccess for Access {
        fn architecture(&self) -> &str {
            "test"
        }

        fn caller_name(&self) -> String {
            format!("caller-{}", self.0)
        }

        fn peripheral_name(&self) -> String {
            "p".to_string()
        }

        fn signal(&self, _name: &str, _args: Vec<Value>) -> bool {
            true
        }
    }

    #[test]
    fn test_get_or_create_reuses() {
        let cache = AttachmentCache::new();
        let id = ConnectionId::next();
        let first = cache.get_or_create(id, || Arc::new(Access(1)));
        let second = cache.get_or_create(id, || Arc::new(Access(2)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.caller_name(), "caller-1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove() {
        let cache = AttachmentCache::new();
        let id = ConnectionId::next();
        assert!(cache.remove(id).is_none());
        cache.get_or_create(id, || Arc::new(Access(1)));
        assert!(cache.contains(id));
        assert!(cache.remove(id).is_some());
        assert!(cache.is_empty());
    }
}
