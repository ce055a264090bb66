//! The lifecycle engine: initialize, transition, inspect
//!
//! All writes for one entity happen under that entity's lock, acquired
//! with a bounded timeout. The write path is check, then history
//! append, then state update; side-effect actions run only after both
//! have committed and their failures never roll a transition back.

use crate::{ActionDispatcher, DefinitionRegistry, EntityRegistry, LoggingDispatcher, RoleChecker};
use lifecycle_guard::{GuardEvaluator, GuardVerdict};
use lifecycle_ledger::HistoryLedger;
use lifecycle_storage::{HistoryStore, InstanceStore, LockManager, StorageError};
use lifecycle_types::{
    ActorId, EntityRef, GuardContext, HistoryEntry, HistoryRecord, LifecycleError,
    LifecycleResult, StateCode, Transition, WorkflowCode, WorkflowInstance,
};
use std::sync::Arc;
use std::time::Duration;

// ── Transition Request ───────────────────────────────────────────────

/// One transition attempt: who wants to move which entity where,
/// under what context
#[derive(Clone, Debug)]
pub struct TransitionRequest {
    pub entity: EntityRef,
    pub target: StateCode,
    pub actor: ActorId,
    pub context: GuardContext,
    pub comment: Option<String>,
}

impl TransitionRequest {
    pub fn new(entity: EntityRef, target: impl Into<String>, actor: ActorId) -> Self {
        Self {
            entity,
            target: StateCode::new(target),
            actor,
            context: GuardContext::new(),
            comment: None,
        }
    }

    pub fn with_context(mut self, context: GuardContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// The result of a committed transition
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    /// The instance after the state change
    pub instance: WorkflowInstance,
    /// The history record the transition appended
    pub record: HistoryRecord,
}

// ── Engine ───────────────────────────────────────────────────────────

/// Metadata-driven state machine engine
pub struct LifecycleEngine {
    definitions: Arc<DefinitionRegistry>,
    entities: Arc<EntityRegistry>,
    instances: Arc<dyn InstanceStore>,
    ledger: HistoryLedger,
    roles: Arc<dyn RoleChecker>,
    dispatcher: Arc<dyn ActionDispatcher>,
    evaluator: GuardEvaluator,
    locks: LockManager<EntityRef>,
}

impl LifecycleEngine {
    pub fn new(
        definitions: Arc<DefinitionRegistry>,
        entities: Arc<EntityRegistry>,
        instances: Arc<dyn InstanceStore>,
        history: Arc<dyn HistoryStore>,
        roles: Arc<dyn RoleChecker>,
    ) -> Self {
        Self {
            definitions,
            entities,
            instances,
            ledger: HistoryLedger::new(history),
            roles,
            dispatcher: Arc::new(LoggingDispatcher::new()),
            evaluator: GuardEvaluator::new(),
            locks: LockManager::new(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.locks = LockManager::with_timeout(timeout);
        self
    }

    /// Bind an entity to a workflow, placing it in the initial state
    /// and writing the initialization history record.
    pub async fn initialize(
        &self,
        entity: EntityRef,
        workflow: &WorkflowCode,
        actor: ActorId,
    ) -> LifecycleResult<WorkflowInstance> {
        let definition = self.definitions.get(workflow)?;
        if definition.entity_type != entity.entity_type {
            return Err(LifecycleError::Configuration(format!(
                "workflow '{}' governs entity type '{}', not '{}'",
                workflow, definition.entity_type, entity.entity_type
            )));
        }

        let accessor = self.entities.accessor(&entity)?;
        if !accessor.exists(&entity.entity_id).await? {
            return Err(LifecycleError::UnknownEntity(entity));
        }

        let initial = definition
            .initial_state()
            .ok_or_else(|| {
                LifecycleError::Configuration(format!("workflow '{}' has no initial state", workflow))
            })?
            .code
            .clone();

        let _lock = self.locks.acquire(&entity).await?;

        if self.instances.get(&entity).await?.is_some() {
            return Err(LifecycleError::AlreadyInitialized(entity));
        }

        let instance = WorkflowInstance::new(entity.clone(), workflow.clone(), initial.clone());
        match self.instances.create(instance.clone()).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                return Err(LifecycleError::AlreadyInitialized(entity));
            }
            Err(err) => return Err(err.into()),
        }

        self.ledger
            .append(HistoryEntry::initialization(
                entity.clone(),
                initial.clone(),
                actor.clone(),
            ))
            .await?;

        tracing::info!(
            entity = %entity,
            workflow = %workflow,
            state = %initial,
            actor = %actor,
            instance = %instance.id.short(),
            "workflow instance initialized"
        );
        Ok(instance)
    }

    /// Attempt a state transition.
    ///
    /// Checks run in a fixed order under the entity's lock: instance,
    /// definition, target state, transition row, guard, approval. The
    /// first failing check decides the error, so a caller who lacks an
    /// approval role on a transition whose guard also fails hears about
    /// the guard.
    pub async fn transition(&self, request: TransitionRequest) -> LifecycleResult<TransitionOutcome> {
        let _lock = self.locks.acquire(&request.entity).await?;

        let instance = self
            .instances
            .get(&request.entity)
            .await?
            .ok_or_else(|| LifecycleError::InstanceNotFound(request.entity.clone()))?;

        let definition = self.definitions.get(&instance.workflow)?;

        if definition.state(&request.target).is_none() {
            return Err(LifecycleError::UnknownState {
                workflow: instance.workflow.clone(),
                state: request.target.clone(),
            });
        }

        let transition = definition
            .transition(&instance.current_state, &request.target)
            .ok_or_else(|| LifecycleError::NoSuchTransition {
                current: instance.current_state.clone(),
                target: request.target.clone(),
            })?;

        if let Some(guard) = &transition.guard {
            let context = self.guard_context(&request).await?;
            if let GuardVerdict::NotSatisfied { reason } = self.evaluator.evaluate(guard, &context)
            {
                return Err(LifecycleError::GuardFailed {
                    expression: guard.to_string(),
                    context: serde_json::to_string(&context.0)
                        .unwrap_or_else(|_| "{}".to_string()),
                    reason,
                });
            }
        }

        let approver = match transition.approval_gate() {
            Some(role) => {
                if !self.roles.has_role(&request.actor, role).await? {
                    return Err(LifecycleError::ApprovalRoleMissing {
                        actor: request.actor.clone(),
                        role: role.clone(),
                    });
                }
                Some(request.actor.clone())
            }
            None => None,
        };

        let mut entry = HistoryEntry::transition(
            request.entity.clone(),
            instance.current_state.clone(),
            request.target.clone(),
            transition.name.clone(),
            request.actor.clone(),
        );
        if let Some(comment) = &request.comment {
            entry = entry.with_comment(comment.clone());
        }
        if let Some(approver) = &approver {
            entry = entry.with_approver(approver.clone());
        }

        // The history append and the state update are one atomicity
        // boundary: a persistent backend must commit both in a single
        // transaction, or the ledger chain and the instance row diverge.
        // The in-memory adapters cannot fail between the two writes.
        let record = self.ledger.append(entry).await?;
        self.instances
            .update_state(&request.entity, request.target.clone())
            .await?;

        let mut updated = instance;
        updated.advance_to(request.target.clone());

        tracing::info!(
            entity = %request.entity,
            from = %record.from_state().map(|s| s.0.as_str()).unwrap_or(""),
            to = %request.target,
            transition = %transition.name,
            actor = %request.actor,
            "transition committed"
        );

        for action in &transition.actions {
            if let Err(err) = self.dispatcher.dispatch(&request.entity, action).await {
                tracing::warn!(
                    entity = %request.entity,
                    action_type = %action.action_type,
                    error = %err,
                    "post-commit action failed"
                );
            }
        }

        Ok(TransitionOutcome {
            instance: updated,
            record,
        })
    }

    /// Transitions leaving the entity's current state that the actor is
    /// eligible to take.
    ///
    /// Approval gates are checked against the actor; guards are not
    /// evaluated, they need the transition-time context. A listed
    /// transition can still fail its guard when attempted.
    pub async fn available_transitions(
        &self,
        entity: &EntityRef,
        actor: &ActorId,
    ) -> LifecycleResult<Vec<Transition>> {
        let instance = self
            .instances
            .get(entity)
            .await?
            .ok_or_else(|| LifecycleError::InstanceNotFound(entity.clone()))?;
        let definition = self.definitions.get(&instance.workflow)?;

        let mut available = Vec::new();
        for transition in definition.transitions_from(&instance.current_state) {
            if let Some(role) = transition.approval_gate() {
                if !self.roles.has_role(actor, role).await? {
                    continue;
                }
            }
            available.push(transition.clone());
        }
        Ok(available)
    }

    /// The entity's current instance
    pub async fn instance(&self, entity: &EntityRef) -> LifecycleResult<WorkflowInstance> {
        self.instances
            .get(entity)
            .await?
            .ok_or_else(|| LifecycleError::InstanceNotFound(entity.clone()))
    }

    /// The entity's full lifecycle history in causal order
    pub async fn history(&self, entity: &EntityRef) -> LifecycleResult<Vec<HistoryRecord>> {
        Ok(self.ledger.for_entity(entity).await?)
    }

    /// The entity's field snapshot overlaid with the caller's context.
    /// Caller-supplied values win over stored ones.
    async fn guard_context(&self, request: &TransitionRequest) -> LifecycleResult<GuardContext> {
        let accessor = self.entities.accessor(&request.entity)?;
        let mut merged = accessor.snapshot(&request.entity.entity_id).await?;
        for (field, value) in &request.context.0 {
            merged.0.insert(field.clone(), value.clone());
        }
        Ok(merged)
    }
}
