//! Content-addressed memory of rejected fixes.
//!
//! Keyed by a digest of (repository, file, original, replacement) so the
//! same edit proposed on a later night is short-circuited regardless of when
//! it was first seen.

use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::{FixKey, RejectedFixRecord};
use crate::domain::ports::{Clock, RejectedFixStore};

#[derive(Clone)]
pub struct RejectedFixMemory {
    store: Arc<dyn RejectedFixStore>,
    clock: Arc<dyn Clock>,
}

impl RejectedFixMemory {
    pub fn new(store: Arc<dyn RejectedFixStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Whether this exact edit was rejected before.
    pub async fn lookup(
        &self,
        repo: &str,
        file_path: &str,
        original: &str,
        replacement: &str,
    ) -> DomainResult<bool> {
        Ok(self
            .previous(repo, file_path, original, replacement)
            .await?
            .is_some())
    }

    /// The stored record for this exact edit, if any.
    pub async fn previous(
        &self,
        repo: &str,
        file_path: &str,
        original: &str,
        replacement: &str,
    ) -> DomainResult<Option<RejectedFixRecord>> {
        let key = FixKey::compute(repo, file_path, original, replacement);
        self.store.get(&key).await
    }

    /// Record a rejection. Repeating it overwrites the reason, never the key.
    pub async fn record(
        &self,
        repo: &str,
        file_path: &str,
        original: &str,
        replacement: &str,
        reason: &str,
    ) -> DomainResult<()> {
        let key = FixKey::compute(repo, file_path, original, replacement);
        let now = self.clock.now();
        debug!(%repo, %file_path, fix_hash = %key, %reason, "recording rejected fix");
        self.store
            .upsert(&RejectedFixRecord {
                key,
                repo: repo.to_string(),
                file_path: file_path.to_string(),
                reason: reason.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRejectedFixStore;
    use crate::domain::ports::SystemClock;

    fn memory() -> (RejectedFixMemory, Arc<InMemoryRejectedFixStore>) {
        let store = Arc::new(InMemoryRejectedFixStore::new());
        (
            RejectedFixMemory::new(store.clone(), Arc::new(SystemClock)),
            store,
        )
    }

    #[tokio::test]
    async fn test_lookup_unknown() {
        let (memory, _) = memory();
        assert!(!memory.lookup("o/r", "a.py", "x", "y").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_then_lookup() {
        let (memory, _) = memory();
        memory
            .record("o/r", "a.py", "x", "y", "no_match")
            .await
            .unwrap();
        assert!(memory.lookup("o/r", "a.py", "x", "y").await.unwrap());
        assert!(!memory.lookup("o/r", "a.py", "x", "z").await.unwrap());
        assert!(!memory.lookup("o/other", "a.py", "x", "y").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_twice_keeps_one_entry_with_latest_reason() {
        let (memory, store) = memory();
        memory
            .record("o/r", "a.py", "x", "y", "syntax_invalid")
            .await
            .unwrap();
        memory
            .record("o/r", "a.py", "x", "y", "tests_failed")
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let record = memory
            .previous("o/r", "a.py", "x", "y")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.reason, "tests_failed");
        assert_eq!(record.key, FixKey::compute("o/r", "a.py", "x", "y"));
    }
}
