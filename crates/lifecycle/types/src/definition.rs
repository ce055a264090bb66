//! Workflow definitions: the metadata blueprint for entity lifecycles
//!
//! A WorkflowDefinition is a directed graph of states connected by
//! guarded, optionally approval-gated transitions. Definitions are
//! authored as metadata elsewhere; here they are validated once and
//! then treated as immutable.

use crate::{EntityTypeTag, GuardExpr, LifecycleError, LifecycleResult, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique code of a workflow definition ("document_lifecycle")
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowCode(pub String);

impl WorkflowCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for WorkflowCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code of a state within a workflow ("draft", "posted")
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateCode(pub String);

impl StateCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for StateCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// A workflow definition — the blueprint for one entity type's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow code
    pub code: WorkflowCode,
    /// Human-readable name
    pub name: String,
    /// The entity type this workflow governs
    pub entity_type: EntityTypeTag,
    /// Version for tracking definition evolution
    pub version: u32,
    /// The states of the lifecycle
    pub states: Vec<State>,
    /// The guarded transitions between states
    pub transitions: Vec<Transition>,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            code: WorkflowCode::new(code),
            name: name.into(),
            entity_type: EntityTypeTag::new(entity_type),
            version: 1,
            states: Vec::new(),
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a state. Rejects duplicate state codes and a second initial state.
    pub fn add_state(&mut self, state: State) -> LifecycleResult<()> {
        if self.states.iter().any(|s| s.code == state.code) {
            return Err(LifecycleError::Validation(format!(
                "duplicate state code '{}' in workflow '{}'",
                state.code, self.code
            )));
        }
        if state.is_initial && self.states.iter().any(|s| s.is_initial) {
            return Err(LifecycleError::Validation(format!(
                "workflow '{}' already has an initial state",
                self.code
            )));
        }
        self.states.push(state);
        Ok(())
    }

    /// Add a transition. Endpoints must exist; at most one transition
    /// per (from, to) pair; guard expressions are validated here, at
    /// save time, so evaluation is total later.
    pub fn add_transition(&mut self, transition: Transition) -> LifecycleResult<()> {
        if !self.states.iter().any(|s| s.code == transition.from) {
            return Err(LifecycleError::UnknownState {
                workflow: self.code.clone(),
                state: transition.from,
            });
        }
        if !self.states.iter().any(|s| s.code == transition.to) {
            return Err(LifecycleError::UnknownState {
                workflow: self.code.clone(),
                state: transition.to,
            });
        }
        if self
            .transitions
            .iter()
            .any(|t| t.from == transition.from && t.to == transition.to)
        {
            return Err(LifecycleError::Validation(format!(
                "duplicate transition {} -> {} in workflow '{}'",
                transition.from, transition.to, self.code
            )));
        }
        if let Some(guard) = &transition.guard {
            guard.validate()?;
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// The single initial state, if one is declared
    pub fn initial_state(&self) -> Option<&State> {
        self.states.iter().find(|s| s.is_initial)
    }

    /// Get a state by code
    pub fn state(&self, code: &StateCode) -> Option<&State> {
        self.states.iter().find(|s| &s.code == code)
    }

    /// Transitions leaving a state, ordered by display order
    pub fn transitions_from(&self, from: &StateCode) -> Vec<&Transition> {
        let mut out: Vec<&Transition> =
            self.transitions.iter().filter(|t| &t.from == from).collect();
        out.sort_by_key(|t| t.display_order);
        out
    }

    /// The transition row for a (from, to) pair
    pub fn transition(&self, from: &StateCode, to: &StateCode) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| &t.from == from && &t.to == to)
    }

    /// Validate the definition for structural correctness.
    ///
    /// A published workflow must have exactly one initial state; every
    /// transition endpoint must exist; guards must be structurally valid.
    pub fn validate(&self) -> LifecycleResult<()> {
        if self.states.is_empty() {
            return Err(LifecycleError::Validation(format!(
                "workflow '{}' has no states",
                self.code
            )));
        }

        let initial_count = self.states.iter().filter(|s| s.is_initial).count();
        if initial_count == 0 {
            return Err(LifecycleError::Configuration(format!(
                "workflow '{}' has no initial state",
                self.code
            )));
        }
        if initial_count > 1 {
            return Err(LifecycleError::Validation(format!(
                "workflow '{}' has {} initial states",
                self.code, initial_count
            )));
        }

        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(&state.code) {
                return Err(LifecycleError::Validation(format!(
                    "duplicate state code '{}' in workflow '{}'",
                    state.code, self.code
                )));
            }
        }

        let mut pairs = HashSet::new();
        for transition in &self.transitions {
            if self.state(&transition.from).is_none() {
                return Err(LifecycleError::UnknownState {
                    workflow: self.code.clone(),
                    state: transition.from.clone(),
                });
            }
            if self.state(&transition.to).is_none() {
                return Err(LifecycleError::UnknownState {
                    workflow: self.code.clone(),
                    state: transition.to.clone(),
                });
            }
            if !pairs.insert((&transition.from, &transition.to)) {
                return Err(LifecycleError::Validation(format!(
                    "duplicate transition {} -> {} in workflow '{}'",
                    transition.from, transition.to, self.code
                )));
            }
            if let Some(guard) = &transition.guard {
                guard.validate()?;
            }
        }

        Ok(())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

// ── State ────────────────────────────────────────────────────────────

/// One node in a workflow's lifecycle graph
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct State {
    /// Unique code within the workflow
    pub code: StateCode,
    /// Human-readable name
    pub name: String,
    /// Exactly one state per workflow carries this flag
    pub is_initial: bool,
    /// Terminal states express completion; metadata may still declare
    /// outgoing transitions from them
    pub is_final: bool,
    /// Whether the bound entity may be edited while in this state
    pub allow_edit: bool,
    /// Whether the bound entity may be deleted while in this state
    pub allow_delete: bool,
}

impl State {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: StateCode::new(code),
            name: name.into(),
            is_initial: false,
            is_final: false,
            allow_edit: false,
            allow_delete: false,
        }
    }

    /// Create the workflow's initial state (editable and deletable by default)
    pub fn initial(code: impl Into<String>, name: impl Into<String>) -> Self {
        let mut state = Self::new(code, name);
        state.is_initial = true;
        state.allow_edit = true;
        state.allow_delete = true;
        state
    }

    pub fn final_state(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.allow_edit = true;
        self
    }

    pub fn deletable(mut self) -> Self {
        self.allow_delete = true;
        self
    }
}

// ── Transition ───────────────────────────────────────────────────────

/// A directed, guarded, optionally approval-gated edge between two states
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    /// Source state code
    pub from: StateCode,
    /// Target state code
    pub to: StateCode,
    /// Human-readable name ("Post", "Reject")
    pub name: String,
    /// Optional guard evaluated against the caller's context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<GuardExpr>,
    /// Whether this transition is approval-gated
    pub requires_approval: bool,
    /// The role whose members may approve; gating requires both this
    /// and `requires_approval`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<RoleId>,
    /// Side effects dispatched after the transition commits
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionSpec>,
    /// Ordering for presentation of available transitions
    pub display_order: u32,
}

impl Transition {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            from: StateCode::new(from),
            to: StateCode::new(to),
            name: name.into(),
            guard: None,
            requires_approval: false,
            approver_role: None,
            actions: Vec::new(),
            display_order: 0,
        }
    }

    pub fn with_guard(mut self, guard: GuardExpr) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_approval(mut self, role: RoleId) -> Self {
        self.requires_approval = true;
        self.approver_role = Some(role);
        self
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_display_order(mut self, order: u32) -> Self {
        self.display_order = order;
        self
    }

    /// Whether an approval check applies: both the flag and a role
    pub fn approval_gate(&self) -> Option<&RoleId> {
        if self.requires_approval {
            self.approver_role.as_ref()
        } else {
            None
        }
    }
}

// ── Action Spec ──────────────────────────────────────────────────────

/// A named side effect declared on a transition, executed by the
/// external action dispatcher after the transition commits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Dispatcher-understood action type ("notify", "sync_storefront")
    pub action_type: String,
    /// Free-form parameters for the dispatcher
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, serde_json::Value>,
}

impl ActionSpec {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}
