//! In-memory storage adapters
//!
//! Reference implementations of the storage traits backed by
//! `RwLock<HashMap>`. Used by the test suites and by embedded callers
//! that do not need persistence across restarts.

use crate::{CounterStore, HistoryStore, InstanceStore, StorageError, StorageResult};
use async_trait::async_trait;
use lifecycle_types::{EntityRef, HistoryRecord, ScopeKey, StateCode, WorkflowInstance};
use std::collections::HashMap;
use std::sync::RwLock;

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{} lock poisoned", what))
}

// ── Instance Store ───────────────────────────────────────────────────

/// In-memory instance store keyed by entity reference
#[derive(Debug, Default)]
pub struct InMemoryInstanceStore {
    instances: RwLock<HashMap<EntityRef, WorkflowInstance>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn create(&self, instance: WorkflowInstance) -> StorageResult<()> {
        let mut instances = self.instances.write().map_err(|_| poisoned("instances"))?;
        if instances.contains_key(&instance.entity) {
            return Err(StorageError::Conflict(format!(
                "entity {} already has an instance",
                instance.entity
            )));
        }
        instances.insert(instance.entity.clone(), instance);
        Ok(())
    }

    async fn get(&self, entity: &EntityRef) -> StorageResult<Option<WorkflowInstance>> {
        let instances = self.instances.read().map_err(|_| poisoned("instances"))?;
        Ok(instances.get(entity).cloned())
    }

    async fn update_state(&self, entity: &EntityRef, state: StateCode) -> StorageResult<()> {
        let mut instances = self.instances.write().map_err(|_| poisoned("instances"))?;
        let instance = instances
            .get_mut(entity)
            .ok_or_else(|| StorageError::NotFound(format!("no instance for entity {}", entity)))?;
        instance.advance_to(state);
        Ok(())
    }
}

// ── History Store ────────────────────────────────────────────────────

/// In-memory append-only history store
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<HashMap<EntityRef, Vec<HistoryRecord>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> StorageResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned("history"))?;
        let entries = records.entry(record.entity().clone()).or_default();
        let expected = entries.len() as u64;
        if record.sequence() != expected {
            return Err(StorageError::InvariantViolation(format!(
                "history for {} expects sequence {}, got {}",
                record.entity(),
                expected,
                record.sequence()
            )));
        }
        entries.push(record);
        Ok(())
    }

    async fn list(&self, entity: &EntityRef) -> StorageResult<Vec<HistoryRecord>> {
        let records = self.records.read().map_err(|_| poisoned("history"))?;
        Ok(records.get(entity).cloned().unwrap_or_default())
    }
}

// ── Counter Store ────────────────────────────────────────────────────

/// In-memory counter store, one slot per scope key
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: RwLock<HashMap<ScopeKey, i64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(
        &self,
        key: &ScopeKey,
        seed: i64,
        increment_by: i64,
    ) -> StorageResult<i64> {
        let mut counters = self.counters.write().map_err(|_| poisoned("counters"))?;
        // seed one step below so the first increment lands on `seed`
        let slot = counters.entry(key.clone()).or_insert(seed - increment_by);
        *slot += increment_by;
        Ok(*slot)
    }

    async fn current(&self, key: &ScopeKey) -> StorageResult<Option<i64>> {
        let counters = self.counters.read().map_err(|_| poisoned("counters"))?;
        Ok(counters.get(key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lifecycle_types::{ActorId, HistoryEntry, SequenceCode, WorkflowCode};

    fn doc() -> EntityRef {
        EntityRef::new("document", "doc-1")
    }

    fn instance() -> WorkflowInstance {
        WorkflowInstance::new(
            doc(),
            WorkflowCode::new("document_lifecycle"),
            StateCode::new("draft"),
        )
    }

    fn scope(sequence: &str) -> ScopeKey {
        ScopeKey {
            sequence: SequenceCode::new(sequence),
            year: Some(2024),
            month: None,
            location: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_second_instance_for_same_entity() {
        let store = InMemoryInstanceStore::new();
        store.create(instance()).await.unwrap();
        let result = store.create(instance()).await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_state_requires_existing_instance() {
        let store = InMemoryInstanceStore::new();
        let result = store.update_state(&doc(), StateCode::new("posted")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        store.create(instance()).await.unwrap();
        store.update_state(&doc(), StateCode::new("posted")).await.unwrap();
        let found = store.get(&doc()).await.unwrap().unwrap();
        assert_eq!(found.current_state, StateCode::new("posted"));
    }

    #[tokio::test]
    async fn test_history_append_enforces_sequence_order() {
        let store = InMemoryHistoryStore::new();
        let entry = HistoryEntry::initialization(doc(), StateCode::new("draft"), ActorId::new("alice"));

        store
            .append(HistoryRecord::sealed(entry.clone(), 0, Utc::now()))
            .await
            .unwrap();

        // re-appending at an occupied position is refused
        let result = store
            .append(HistoryRecord::sealed(entry.clone(), 0, Utc::now()))
            .await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));

        // and so is skipping ahead
        let result = store
            .append(HistoryRecord::sealed(entry, 5, Utc::now()))
            .await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_history_list_preserves_append_order() {
        let store = InMemoryHistoryStore::new();
        let init = HistoryEntry::initialization(doc(), StateCode::new("draft"), ActorId::new("alice"));
        let step = HistoryEntry::transition(
            doc(),
            StateCode::new("draft"),
            StateCode::new("posted"),
            "Post",
            ActorId::new("alice"),
        );
        store.append(HistoryRecord::sealed(init, 0, Utc::now())).await.unwrap();
        store.append(HistoryRecord::sealed(step, 1, Utc::now())).await.unwrap();

        let records = store.list(&doc()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_initialization());
        assert_eq!(records[1].sequence(), 1);
    }

    #[tokio::test]
    async fn test_counter_first_value_is_seed() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.increment(&scope("PO"), 100, 1).await.unwrap(), 100);
        assert_eq!(store.increment(&scope("PO"), 100, 1).await.unwrap(), 101);
        assert_eq!(store.current(&scope("PO")).await.unwrap(), Some(101));
    }

    #[tokio::test]
    async fn test_counter_scopes_are_independent() {
        let store = InMemoryCounterStore::new();
        store.increment(&scope("PO"), 1, 1).await.unwrap();
        store.increment(&scope("PO"), 1, 1).await.unwrap();
        assert_eq!(store.increment(&scope("INV"), 1, 1).await.unwrap(), 1);
        assert_eq!(store.current(&scope("PO")).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_counter_honors_increment_step() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.increment(&scope("PO"), 10, 10).await.unwrap(), 10);
        assert_eq!(store.increment(&scope("PO"), 10, 10).await.unwrap(), 20);
    }
}
