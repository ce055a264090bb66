//! Entity registry: the seam between the engine and business entities
//!
//! The engine governs entity types it has never seen at compile time.
//! Host code registers an [`EntityAccessor`] per type tag; the engine
//! uses it to confirm an entity exists and to read the field snapshot
//! guards evaluate against. The accessor is a read-only view, the
//! engine never writes through it.

use async_trait::async_trait;
use lifecycle_types::{EntityRef, EntityTypeTag, GuardContext, LifecycleError, LifecycleResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Read-only access to one kind of business entity
#[async_trait]
pub trait EntityAccessor: Send + Sync {
    /// Whether an entity with this id exists
    async fn exists(&self, entity_id: &str) -> LifecycleResult<bool>;

    /// The entity's current field values, as guard context
    async fn snapshot(&self, entity_id: &str) -> LifecycleResult<GuardContext>;
}

/// Maps entity type tags to their accessors
#[derive(Default)]
pub struct EntityRegistry {
    accessors: RwLock<HashMap<EntityTypeTag, Arc<dyn EntityAccessor>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accessor for a type tag. Re-registering a tag
    /// replaces the accessor; tags are host-owned.
    pub fn register(&self, tag: EntityTypeTag, accessor: Arc<dyn EntityAccessor>) {
        if let Ok(mut accessors) = self.accessors.write() {
            tracing::info!(entity_type = %tag, "entity type registered");
            accessors.insert(tag, accessor);
        }
    }

    /// Resolve the accessor for an entity, failing with `UnknownEntity`
    /// when its type tag was never registered
    pub fn accessor(&self, entity: &EntityRef) -> LifecycleResult<Arc<dyn EntityAccessor>> {
        let accessors = self
            .accessors
            .read()
            .map_err(|_| LifecycleError::Backend("entity registry lock poisoned".into()))?;
        accessors
            .get(&entity.entity_type)
            .cloned()
            .ok_or_else(|| LifecycleError::UnknownEntity(entity.clone()))
    }
}

// ── In-memory accessor ───────────────────────────────────────────────

/// Accessor backed by a map of entity ids to field snapshots. Used by
/// the test suites and by hosts whose entities live in memory.
#[derive(Default)]
pub struct InMemoryEntities {
    entities: RwLock<HashMap<String, GuardContext>>,
}

impl InMemoryEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity_id: impl Into<String>, snapshot: GuardContext) {
        if let Ok(mut entities) = self.entities.write() {
            entities.insert(entity_id.into(), snapshot);
        }
    }
}

#[async_trait]
impl EntityAccessor for InMemoryEntities {
    async fn exists(&self, entity_id: &str) -> LifecycleResult<bool> {
        let entities = self
            .entities
            .read()
            .map_err(|_| LifecycleError::Backend("entity map lock poisoned".into()))?;
        Ok(entities.contains_key(entity_id))
    }

    async fn snapshot(&self, entity_id: &str) -> LifecycleResult<GuardContext> {
        let entities = self
            .entities
            .read()
            .map_err(|_| LifecycleError::Backend("entity map lock poisoned".into()))?;
        Ok(entities.get(entity_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unregistered_tag_is_unknown_entity() {
        let registry = EntityRegistry::new();
        let err = registry
            .accessor(&EntityRef::new("document", "doc-1"))
            .err()
            .unwrap();
        assert_eq!(err.code(), "unknown_entity");
    }

    #[tokio::test]
    async fn test_registered_accessor_answers_existence() {
        let registry = EntityRegistry::new();
        let entities = Arc::new(InMemoryEntities::new());
        entities.insert("doc-1", GuardContext::new().with_value("total", 10));
        registry.register(EntityTypeTag::new("document"), entities);

        let accessor = registry
            .accessor(&EntityRef::new("document", "doc-1"))
            .unwrap();
        assert!(accessor.exists("doc-1").await.unwrap());
        assert!(!accessor.exists("doc-2").await.unwrap());

        let snapshot = accessor.snapshot("doc-1").await.unwrap();
        assert!(snapshot.contains("total"));
    }
}
