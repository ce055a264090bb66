//! Error taxonomy for the lifecycle engine
//!
//! Every failure mode a caller can hit maps to one variant here, each
//! with a stable machine-readable code. Storage backends have their own
//! error type and convert into `Backend` or `ConcurrencyConflict` at
//! the crate boundary.

use crate::{ActorId, EntityRef, RoleId, StateCode, WorkflowCode};
use thiserror::Error;

/// Result alias used across the lifecycle crates
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// All errors surfaced by the lifecycle engine
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Workflow or sequence metadata is structurally broken
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The entity already has a workflow instance
    #[error("entity {0} is already bound to a workflow instance")]
    AlreadyInitialized(EntityRef),

    /// No workflow instance exists for the entity
    #[error("no workflow instance exists for entity {0}")]
    InstanceNotFound(EntityRef),

    /// The entity's type tag is not registered, or no such entity exists
    #[error("entity {0} is not known to the engine")]
    UnknownEntity(EntityRef),

    /// A state code does not exist in the workflow definition
    #[error("state '{state}' does not exist in workflow '{workflow}'")]
    UnknownState {
        workflow: WorkflowCode,
        state: StateCode,
    },

    /// No transition connects the current state to the requested one
    #[error("no transition from state '{current}' to state '{target}'")]
    NoSuchTransition {
        current: StateCode,
        target: StateCode,
    },

    /// The transition's guard evaluated to false
    #[error("guard not satisfied: {reason} (expression: {expression}, context: {context})")]
    GuardFailed {
        expression: String,
        context: String,
        reason: String,
    },

    /// The actor lacks the role required to approve the transition
    #[error("actor '{actor}' does not hold approval role '{role}'")]
    ApprovalRoleMissing { actor: ActorId, role: RoleId },

    /// An attempt was made to rewrite the append-only history
    #[error("immutability violation: {0}")]
    ImmutabilityViolation(String),

    /// A per-entity or per-scope lock could not be acquired in time
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Metadata failed validation at save time
    #[error("validation error: {0}")]
    Validation(String),

    /// The storage backend failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl LifecycleError {
    /// Stable machine-readable code, independent of message wording
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::AlreadyInitialized(_) => "already_initialized",
            Self::InstanceNotFound(_) => "instance_not_found",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::UnknownState { .. } => "unknown_state",
            Self::NoSuchTransition { .. } => "no_such_transition",
            Self::GuardFailed { .. } => "guard_failed",
            Self::ApprovalRoleMissing { .. } => "approval_role_missing",
            Self::ImmutabilityViolation(_) => "immutability_violation",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::Validation(_) => "validation_error",
            Self::Backend(_) => "backend_error",
        }
    }

    /// Whether retrying the same call may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_) | Self::Backend(_))
    }
}
