//! # In-Memory Usage Store
//!
//! Process-local counters. Lost on restart; use `FileUsageStore` to persist.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::errors::{StoreError, StoreResult};
use super::record::{UsageKey, UsageRecord};
use super::{UsageStore, UsageUpdate};

/// In-memory usage store
#[derive(Debug, Clone, Default)]
pub struct MemoryUsageStore {
    records: Arc<RwLock<HashMap<UsageKey, UsageRecord>>>,
}

impl MemoryUsageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<UsageKey, UsageRecord>>> {
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable("usage map lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<UsageKey, UsageRecord>>> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("usage map lock poisoned".to_string()))
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn load(&self, key: &UsageKey) -> StoreResult<Option<UsageRecord>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn save(&self, record: UsageRecord) -> StoreResult<()> {
        self.write()?.insert(record.key(), record);
        Ok(())
    }

    async fn update(&self, key: &UsageKey, apply: UsageUpdate) -> StoreResult<UsageRecord> {
        let mut records = self.write()?;
        let updated = apply(records.get(key).cloned());
        records.insert(key.clone(), updated.clone());
        Ok(updated)
    }

    async fn records(&self) -> StoreResult<Vec<UsageRecord>> {
        Ok(self.read()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Feature, QuotaWindow, Subject};
    use chrono::Utc;

    fn key(user: &str) -> UsageKey {
        UsageKey::new(Subject::User(user.to_string()), Feature::AiChatbot)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryUsageStore::new();
        assert!(store.load(&key("a")).await.unwrap().is_none());

        let record = UsageRecord::fresh(&key("a"), QuotaWindow::Daily, Utc::now());
        store.save(record.clone()).await.unwrap();

        assert_eq!(store.load(&key("a")).await.unwrap(), Some(record));
        assert!(store.load(&key("b")).await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_creates_and_increments() {
        let store = MemoryUsageStore::new();
        let now = Utc::now();

        for _ in 0..3 {
            let k = key("a");
            store
                .update(
                    &key("a"),
                    Box::new(move |current: Option<UsageRecord>| {
                        let mut record = current
                            .unwrap_or_else(|| UsageRecord::fresh(&k, QuotaWindow::Daily, now));
                        record.increment(now);
                        record
                    }),
                )
                .await
                .unwrap();
        }

        let record = store.load(&key("a")).await.unwrap().unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(store.records().await.unwrap().len(), 1);
    }
}
