//! In-memory user store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::UserStore;
use crate::error::Result;
use crate::record::{UserId, UserRecord};

/// [`UserStore`] kept in a map. Counts upserts so tests can assert on
/// write-back behaviour.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    records: Mutex<BTreeMap<UserId, UserRecord>>,
    upserts: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `records`. Seeding is not counted as
    /// upserts.
    pub fn with_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.user_id, r)).collect();
        Self {
            records: Mutex::new(records),
            upserts: AtomicUsize::new(0),
        }
    }

    /// Number of `upsert_record` calls so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Synchronous read for assertions.
    pub fn snapshot(&self, id: UserId) -> Option<UserRecord> {
        self.records.lock().get(&id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_record(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.snapshot(id))
    }

    async fn upsert_record(&self, record: &UserRecord) -> Result<()> {
        self.records.lock().insert(record.user_id, record.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn all_user_ids(&self) -> Result<Vec<UserId>> {
        Ok(self.records.lock().keys().copied().collect())
    }

    async fn contains(&self, id: UserId) -> Result<bool> {
        Ok(self.records.lock().contains_key(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_and_counts() {
        let store = MemoryUserStore::with_records([UserRecord::new(1, "en")]);
        assert_eq!(store.upsert_count(), 0);

        let mut record = UserRecord::new(1, "fa");
        record.frequencies.increment(3);
        store.upsert_record(&record).await.unwrap();

        assert_eq!(store.upsert_count(), 1);
        assert_eq!(store.get_record(1).await.unwrap(), Some(record));
        assert!(store.contains(1).await.unwrap());
        assert!(!store.contains(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_user_ids_sorted() {
        let store = MemoryUserStore::with_records(
            [30, 10, 20].into_iter().map(|id| UserRecord::new(id, "en")),
        );
        assert_eq!(store.all_user_ids().await.unwrap(), vec![10, 20, 30]);
    }
}
