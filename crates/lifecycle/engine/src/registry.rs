//! Workflow definition registry
//!
//! Definitions are validated when registered, so every definition the
//! engine reads at transition time is known to be well-formed. A
//! registered definition is immutable; publishing a revision means
//! registering a new workflow code.

use lifecycle_types::{LifecycleError, LifecycleResult, WorkflowCode, WorkflowDefinition};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<WorkflowCode, Arc<WorkflowDefinition>>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow definition. Structural problems (no initial
    /// state, dangling transition endpoints, invalid guards) are
    /// refused here.
    pub fn register(&self, definition: WorkflowDefinition) -> LifecycleResult<()> {
        definition.validate()?;
        let mut definitions = self
            .definitions
            .write()
            .map_err(|_| LifecycleError::Backend("definition registry lock poisoned".into()))?;
        if definitions.contains_key(&definition.code) {
            return Err(LifecycleError::Configuration(format!(
                "workflow '{}' is already registered",
                definition.code
            )));
        }
        tracing::info!(
            workflow = %definition.code,
            entity_type = %definition.entity_type,
            states = definition.states.len(),
            transitions = definition.transitions.len(),
            "workflow definition registered"
        );
        definitions.insert(definition.code.clone(), Arc::new(definition));
        Ok(())
    }

    /// Fetch a definition by code
    pub fn get(&self, code: &WorkflowCode) -> LifecycleResult<Arc<WorkflowDefinition>> {
        let definitions = self
            .definitions
            .read()
            .map_err(|_| LifecycleError::Backend("definition registry lock poisoned".into()))?;
        definitions.get(code).cloned().ok_or_else(|| {
            LifecycleError::Configuration(format!("workflow '{}' is not registered", code))
        })
    }

    /// Codes of all registered workflows
    pub fn codes(&self) -> Vec<WorkflowCode> {
        self.definitions
            .read()
            .map(|definitions| definitions.keys().cloned().collect())
            .unwrap_or_default()
    }
}
