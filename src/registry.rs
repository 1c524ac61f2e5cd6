//! In-flight process registry
//!
//! Maps a caller-supplied request identifier to the live OS process behind
//! it so a different task can cancel the request mid-flight. Registration
//! happens on the executing task right after spawn; removal can come from
//! any task. An identifier present in the registry denotes a process the
//! caller may still cancel; absence after having been present is the
//! cancellation signal observed by the orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Handle to one live extraction process
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    /// OS process id, when the runtime reported one at spawn time
    pub pid: Option<u32>,
}

impl ProcessHandle {
    /// Create a handle for a freshly spawned process
    pub fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }
}

/// Concurrency-safe registry of in-flight extraction processes
///
/// Every operation is atomic on its own; no ordering is guaranteed between
/// operations racing from different tasks.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<HashMap<String, ProcessHandle>>>,
}

impl ProcessRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, failing if the identifier is already present
    ///
    /// On failure the existing entry is left untouched.
    pub async fn register(&self, id: &str, handle: ProcessHandle) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(id) {
            return Err(Error::DuplicateRequest { id: id.to_string() });
        }
        entries.insert(id.to_string(), handle);
        Ok(())
    }

    /// Remove an entry, returning its handle; no-op when absent
    pub async fn unregister(&self, id: &str) -> Option<ProcessHandle> {
        self.entries.lock().await.remove(id)
    }

    /// Point-in-time membership check
    pub async fn is_registered(&self, id: &str) -> bool {
        self.entries.lock().await.contains_key(id)
    }

    /// Number of in-flight entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no entry is in flight
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_unregister_round_trip() {
        let registry = ProcessRegistry::new();

        registry
            .register("req-1", ProcessHandle::new(Some(100)))
            .await
            .unwrap();
        assert!(registry.is_registered("req-1").await);
        assert_eq!(registry.len().await, 1);

        let handle = registry.unregister("req-1").await.unwrap();
        assert_eq!(handle.pid, Some(100));
        assert!(!registry.is_registered("req-1").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_registration_fails_without_mutating_entry() {
        let registry = ProcessRegistry::new();
        registry
            .register("req-1", ProcessHandle::new(Some(100)))
            .await
            .unwrap();

        let err = registry
            .register("req-1", ProcessHandle::new(Some(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRequest { id } if id == "req-1"));

        // Original entry survives the failed insert
        let handle = registry.unregister("req-1").await.unwrap();
        assert_eq!(handle.pid, Some(100));
    }

    #[tokio::test]
    async fn unregister_absent_id_is_noop() {
        let registry = ProcessRegistry::new();
        assert!(registry.unregister("missing").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_register_unregister_leaves_no_entries() {
        let registry = ProcessRegistry::new();
        let mut handles = Vec::new();

        for i in 0..100u32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("req-{i}");
                registry
                    .register(&id, ProcessHandle::new(Some(i)))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
                registry.unregister(&id).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 0);
    }
}
