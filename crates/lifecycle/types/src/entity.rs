//! Entity references and actor identities
//!
//! The engine binds behavior to entity types it has never seen at
//! compile time. An entity participates in workflows through an opaque
//! `(type tag, id)` pair — the engine never holds a pointer into the
//! entity itself, and entities never hold pointers into the engine.

use serde::{Deserialize, Serialize};

// ── Entity Type Tag ──────────────────────────────────────────────────

/// An opaque tag naming a kind of business entity ("document", "sku",
/// "config_sandbox"). Tags are registered with the engine's entity
/// registry before any instance of that kind may enter a workflow.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityTypeTag(pub String);

impl EntityTypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityTypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Entity Reference ─────────────────────────────────────────────────

/// A reference to one external business entity: type tag + opaque id.
///
/// This pair is the unique key for a workflow instance. It is a
/// back-reference usable for lookup, not for lifecycle control.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The registered kind of entity
    pub entity_type: EntityTypeTag,
    /// The entity's own identifier, opaque to the engine
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: EntityTypeTag::new(entity_type),
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

// ── Actor and Role Identifiers ───────────────────────────────────────

/// The identity of a user or system actor requesting a transition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role identifier, resolved through the injected role checker.
/// Role storage itself lives outside the engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
