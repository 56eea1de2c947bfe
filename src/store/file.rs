//! # File Usage Store
//!
//! Counters kept in a JSON file that is the only copy: every call re-reads
//! it, and every change is written back before the call returns. A server
//! and CLI invocations pointed at the same path share one set of counters.
//!
//! Access is serialized across processes by an advisory lock on a sibling
//! `*.lock` file (shared for reads, exclusive for read-modify-write). The
//! data file itself is replaced by rename, so it cannot carry the lock.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fd_lock::RwLock as FileLock;

use super::errors::{StoreError, StoreResult};
use super::record::{UsageKey, UsageRecord};
use super::{UsageStore, UsageUpdate};

type RecordMap = HashMap<UsageKey, UsageRecord>;

/// JSON file backed usage store
#[derive(Debug, Clone)]
pub struct FileUsageStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileUsageStore {
    /// Open the store at `path`; a missing file is an empty store.
    ///
    /// An existing file that does not parse is rejected here rather than on
    /// first use.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            lock_path: path.with_extension("json.lock"),
            path,
        };
        let records = store.read(|records| records.len()).await?;

        tracing::debug!(path = %store.path.display(), records, "opened usage store");
        Ok(store)
    }

    /// Run `op` on the current file contents under a shared lock
    async fn read<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(RecordMap) -> T + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        blocking(move || {
            let lock = lock_file(&lock_path)?;
            let _guard = lock.read()?;
            Ok(op(read_records(&path)?))
        })
        .await
    }

    /// Run `op` on the current file contents under an exclusive lock and
    /// write the result back. On a failed write the file is left unchanged.
    async fn write<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut RecordMap) -> T + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        blocking(move || {
            let mut lock = lock_file(&lock_path)?;
            let _guard = lock.write()?;
            let mut records = read_records(&path)?;
            let out = op(&mut records);
            write_records(&path, &records)?;
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl UsageStore for FileUsageStore {
    async fn load(&self, key: &UsageKey) -> StoreResult<Option<UsageRecord>> {
        let key = key.clone();
        self.read(move |records| records.get(&key).cloned()).await
    }

    async fn save(&self, record: UsageRecord) -> StoreResult<()> {
        self.write(move |records| {
            records.insert(record.key(), record);
        })
        .await
    }

    async fn update(&self, key: &UsageKey, apply: UsageUpdate) -> StoreResult<UsageRecord> {
        let key = key.clone();
        self.write(move |records| {
            let updated = apply(records.get(&key).cloned());
            records.insert(key, updated.clone());
            updated
        })
        .await
    }

    async fn records(&self) -> StoreResult<Vec<UsageRecord>> {
        self.read(|records| records.into_values().collect()).await
    }
}

async fn blocking<T, F>(op: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::Unavailable(format!("usage store task failed: {}", e)))?
}

fn lock_file(lock_path: &Path) -> StoreResult<FileLock<File>> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    Ok(FileLock::new(file))
}

fn read_records(path: &Path) -> StoreResult<RecordMap> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
        Ok(contents) => {
            let rows: Vec<UsageRecord> = serde_json::from_str(&contents)?;
            Ok(rows.into_iter().map(|r| (r.key(), r)).collect())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace the file atomically with all records, sorted for stable diffs
fn write_records(path: &Path, records: &RecordMap) -> StoreResult<()> {
    let mut rows: Vec<&UsageRecord> = records.values().collect();
    rows.sort_by(|a, b| (&a.subject, a.feature).cmp(&(&b.subject, b.feature)));
    let json = serde_json::to_vec_pretty(&rows)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Feature, QuotaWindow, Subject};
    use chrono::Utc;
    use tempfile::TempDir;

    fn key() -> UsageKey {
        UsageKey::new(Subject::Anonymous("10.0.0.1".to_string()), Feature::DrugReference)
    }

    fn user_key(user: &str) -> UsageKey {
        UsageKey::new(Subject::User(user.to_string()), Feature::AiChatbot)
    }

    fn bump(key: UsageKey) -> UsageUpdate {
        let now = Utc::now();
        Box::new(move |current: Option<UsageRecord>| {
            let mut record =
                current.unwrap_or_else(|| UsageRecord::fresh(&key, QuotaWindow::Daily, now));
            record.increment(now);
            record
        })
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileUsageStore::open(dir.path().join("usage.json")).await.unwrap();
        assert!(store.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("usage.json");
        let now = Utc::now();

        {
            let store = FileUsageStore::open(&path).await.unwrap();
            let mut record = UsageRecord::fresh(&key(), QuotaWindow::Daily, now);
            record.increment(now);
            record.increment(now);
            store.save(record).await.unwrap();
        }

        let reopened = FileUsageStore::open(&path).await.unwrap();
        let record = reopened.load(&key()).await.unwrap().unwrap();
        assert_eq!(record.count, 2);
        assert_eq!(record.subject, Subject::Anonymous("10.0.0.1".to_string()));
    }

    #[tokio::test]
    async fn test_update_is_written_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        let store = FileUsageStore::open(&path).await.unwrap();

        store.update(&key(), bump(key())).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<UsageRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(FileUsageStore::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_handles_on_one_file_share_counters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        let server = FileUsageStore::open(&path).await.unwrap();
        let cli = FileUsageStore::open(&path).await.unwrap();
        let now = Utc::now();

        let mut record = UsageRecord::fresh(&user_key("a"), QuotaWindow::Daily, now);
        for _ in 0..3 {
            record.increment(now);
        }
        cli.save(record).await.unwrap();

        let seen = server.load(&user_key("a")).await.unwrap().unwrap();
        assert_eq!(seen.count, 3);

        server
            .save(UsageRecord::fresh(&user_key("b"), QuotaWindow::Daily, now))
            .await
            .unwrap();

        // the second write keeps the first handle's record
        let reopened = FileUsageStore::open(&path).await.unwrap();
        assert_eq!(reopened.load(&user_key("a")).await.unwrap().unwrap().count, 3);
        assert!(reopened.load(&user_key("b")).await.unwrap().is_some());
        assert_eq!(cli.records().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_from_two_handles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        let first = FileUsageStore::open(&path).await.unwrap();
        let second = FileUsageStore::open(&path).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = if i % 2 == 0 { first.clone() } else { second.clone() };
            tasks.push(tokio::spawn(async move {
                store.update(&key(), bump(key())).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(first.load(&key()).await.unwrap().unwrap().count, 20);
    }
}
