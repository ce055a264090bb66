//! Workflow instances and history records
//!
//! A WorkflowInstance binds one external entity to one workflow and
//! exactly one current state. It is created once by the engine, mutated
//! only by the engine, and never deleted — final states express
//! termination, not deletion.
//!
//! HistoryRecord is the unit of the append-only audit ledger. Its
//! fields are private and it has no mutable accessor: once constructed
//! it cannot be changed through the type system at all.

use crate::{ActorId, EntityRef, StateCode, WorkflowCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Instance Identifier ──────────────────────────────────────────────

/// Unique identifier for a workflow instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// First eight bytes of the id for log lines; the whole id when it
    /// is shorter or the cut would split a multibyte character
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Instance ────────────────────────────────────────────────

/// The runtime binding of one entity to one workflow and its current state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique instance identifier
    pub id: InstanceId,
    /// The bound entity (the unique key for the instance)
    pub entity: EntityRef,
    /// The governing workflow
    pub workflow: WorkflowCode,
    /// The single current state
    pub current_state: StateCode,
    /// When the instance was created
    pub created_at: DateTime<Utc>,
    /// When the instance last changed state
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    pub fn new(entity: EntityRef, workflow: WorkflowCode, initial_state: StateCode) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::generate(),
            entity,
            workflow,
            current_state: initial_state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the instance to a new state. Only the engine calls this,
    /// inside the per-entity lock scope.
    pub fn advance_to(&mut self, state: StateCode) {
        self.current_state = state;
        self.updated_at = Utc::now();
    }
}

// ── History Entry (append input) ─────────────────────────────────────

/// The caller-supplied part of a history record. The ledger assigns the
/// sequence number and timestamp at append time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The entity whose lifecycle changed
    pub entity: EntityRef,
    /// The prior state; `None` only for the initialization record
    pub from_state: Option<StateCode>,
    /// The state entered
    pub to_state: StateCode,
    /// Name of the transition taken; `None` for initialization
    pub transition: Option<String>,
    /// Who requested the change
    pub actor: ActorId,
    /// Optional free-text comment
    pub comment: Option<String>,
    /// Set when the transition was approval-gated
    pub approver: Option<ActorId>,
}

impl HistoryEntry {
    /// Entry for the initialization record (`from_state = None`)
    pub fn initialization(entity: EntityRef, to_state: StateCode, actor: ActorId) -> Self {
        Self {
            entity,
            from_state: None,
            to_state,
            transition: None,
            actor,
            comment: None,
            approver: None,
        }
    }

    /// Entry for a state transition
    pub fn transition(
        entity: EntityRef,
        from_state: StateCode,
        to_state: StateCode,
        transition: impl Into<String>,
        actor: ActorId,
    ) -> Self {
        Self {
            entity,
            from_state: Some(from_state),
            to_state,
            transition: Some(transition.into()),
            actor,
            comment: None,
            approver: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_approver(mut self, approver: ActorId) -> Self {
        self.approver = Some(approver);
        self
    }
}

// ── History Record ───────────────────────────────────────────────────

/// One immutable entry in the append-only history ledger.
///
/// Fields are private and no `&mut` accessor exists; the only way to
/// obtain a record is `HistoryRecord::sealed`, and the only thing a
/// store can do with one is append it and hand out clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    sequence: u64,
    entity: EntityRef,
    from_state: Option<StateCode>,
    to_state: StateCode,
    transition: Option<String>,
    actor: ActorId,
    comment: Option<String>,
    approver: Option<ActorId>,
    recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Seal an entry into a record. Called by the ledger at append time,
    /// which assigns the per-entity sequence number.
    pub fn sealed(entry: HistoryEntry, sequence: u64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            sequence,
            entity: entry.entity,
            from_state: entry.from_state,
            to_state: entry.to_state,
            transition: entry.transition,
            actor: entry.actor,
            comment: entry.comment,
            approver: entry.approver,
            recorded_at,
        }
    }

    /// Monotonically increasing position within the entity's history
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// `None` only on the initialization record
    pub fn from_state(&self) -> Option<&StateCode> {
        self.from_state.as_ref()
    }

    pub fn to_state(&self) -> &StateCode {
        &self.to_state
    }

    pub fn transition(&self) -> Option<&str> {
        self.transition.as_deref()
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn approver(&self) -> Option<&ActorId> {
        self.approver.as_ref()
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Whether this is the initialization record
    pub fn is_initialization(&self) -> bool {
        self.from_state.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> EntityRef {
        EntityRef::new("document", "doc-1")
    }

    #[test]
    fn test_instance_starts_at_initial_state() {
        let inst = WorkflowInstance::new(
            doc(),
            WorkflowCode::new("document_lifecycle"),
            StateCode::new("draft"),
        );
        assert_eq!(inst.current_state, StateCode::new("draft"));
        assert_eq!(inst.created_at, inst.updated_at);
    }

    #[test]
    fn test_advance_updates_state_and_timestamp() {
        let mut inst = WorkflowInstance::new(
            doc(),
            WorkflowCode::new("document_lifecycle"),
            StateCode::new("draft"),
        );
        inst.advance_to(StateCode::new("posted"));
        assert_eq!(inst.current_state, StateCode::new("posted"));
        assert!(inst.updated_at >= inst.created_at);
    }

    #[test]
    fn test_initialization_entry_has_no_from_state() {
        let entry = HistoryEntry::initialization(doc(), StateCode::new("draft"), ActorId::new("alice"));
        let record = HistoryRecord::sealed(entry, 0, Utc::now());
        assert!(record.is_initialization());
        assert_eq!(record.from_state(), None);
        assert_eq!(record.to_state(), &StateCode::new("draft"));
        assert_eq!(record.transition(), None);
    }

    #[test]
    fn test_transition_entry_carries_approver_and_comment() {
        let entry = HistoryEntry::transition(
            doc(),
            StateCode::new("draft"),
            StateCode::new("posted"),
            "Post",
            ActorId::new("bob"),
        )
        .with_comment("ready for posting")
        .with_approver(ActorId::new("bob"));

        let record = HistoryRecord::sealed(entry, 1, Utc::now());
        assert_eq!(record.sequence(), 1);
        assert_eq!(record.from_state(), Some(&StateCode::new("draft")));
        assert_eq!(record.transition(), Some("Post"));
        assert_eq!(record.comment(), Some("ready for posting"));
        assert_eq!(record.approver(), Some(&ActorId::new("bob")));
    }

    #[test]
    fn test_record_round_trips_through_serde() {
        let entry = HistoryEntry::transition(
            doc(),
            StateCode::new("draft"),
            StateCode::new("review"),
            "Submit",
            ActorId::new("alice"),
        );
        let record = HistoryRecord::sealed(entry, 3, Utc::now());
        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: HistoryRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_instance_id() {
        let id = InstanceId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);
    }

    #[test]
    fn test_short_handles_caller_supplied_ids() {
        assert_eq!(InstanceId::new("abc").short(), "abc");
        assert_eq!(InstanceId::new("abcdefghij").short(), "abcdefgh");
        // a multibyte character straddling the cut falls back to the full id
        let id = InstanceId::new("instanzüberschrift");
        assert_eq!(id.short(), "instanzüberschrift");
    }
}
