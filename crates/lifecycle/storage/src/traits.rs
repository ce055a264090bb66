//! Async storage traits the engine persists through
//!
//! Implementations must be `Send + Sync`; the engine holds them behind
//! `Arc<dyn ...>` and calls them from concurrent tasks.

use crate::StorageResult;
use async_trait::async_trait;
use lifecycle_types::{EntityRef, HistoryRecord, ScopeKey, StateCode, WorkflowInstance};

/// Persistence for workflow instances, keyed by entity reference.
///
/// There is deliberately no delete: instances outlive the documents
/// they track, and final states express termination.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Insert a new instance. Fails with `Conflict` if the entity is
    /// already bound to one.
    async fn create(&self, instance: WorkflowInstance) -> StorageResult<()>;

    /// Fetch the instance bound to an entity, if any
    async fn get(&self, entity: &EntityRef) -> StorageResult<Option<WorkflowInstance>>;

    /// Move an existing instance to a new state. Fails with `NotFound`
    /// if no instance is bound to the entity.
    async fn update_state(&self, entity: &EntityRef, state: StateCode) -> StorageResult<()>;
}

/// Persistence for the append-only history ledger.
///
/// The only write is `append`; correction happens through compensating
/// records, never by editing what was written.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one sealed record. Fails with `InvariantViolation` if the
    /// record's sequence number is not the next one for its entity.
    async fn append(&self, record: HistoryRecord) -> StorageResult<()>;

    /// All records for an entity in append order
    async fn list(&self, entity: &EntityRef) -> StorageResult<Vec<HistoryRecord>>;
}

/// Persistence for numbering counters, one row per scope key.
///
/// `increment` is the only way a number is produced. Backends must make
/// it atomic per key; deriving values from existing documents is how
/// gaps and duplicates happen.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically advance the counter for a scope and return the new
    /// value. A key seen for the first time is seeded so that the first
    /// returned value is `seed`.
    async fn increment(&self, key: &ScopeKey, seed: i64, increment_by: i64)
        -> StorageResult<i64>;

    /// The last value handed out for a scope, if any
    async fn current(&self, key: &ScopeKey) -> StorageResult<Option<i64>>;
}
