//! # Usage Store
//!
//! Persistent per-(subject, feature) usage counters.
//!
//! ## Components
//!
//! - `record`: Usage record and key types
//! - `memory`: Process-local store (development/testing)
//! - `file`: JSON file store, survives restarts
//! - `errors`: Store errors
//!
//! The gate owns all window logic; a store only loads, saves and applies
//! atomic read-modify-write updates.

pub mod errors;
pub mod file;
pub mod memory;
pub mod record;

pub use errors::*;
pub use file::FileUsageStore;
pub use memory::MemoryUsageStore;
pub use record::*;

use async_trait::async_trait;

/// Read-modify-write step applied atomically by [`UsageStore::update`]
///
/// Receives the current record (if any) and returns the record to store.
pub type UsageUpdate = Box<dyn FnOnce(Option<UsageRecord>) -> UsageRecord + Send>;

/// Storage backend for usage counters
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Fetch the record for a key
    async fn load(&self, key: &UsageKey) -> StoreResult<Option<UsageRecord>>;

    /// Insert or replace a record
    async fn save(&self, record: UsageRecord) -> StoreResult<()>;

    /// Atomically replace the record for `key` with `apply(current)`
    async fn update(&self, key: &UsageKey, apply: UsageUpdate) -> StoreResult<UsageRecord>;

    /// All stored records
    async fn records(&self) -> StoreResult<Vec<UsageRecord>>;
}
