//! Post-commit action dispatch
//!
//! Transitions may declare side effects ("notify", "sync_storefront").
//! They run after the state change and history record have committed;
//! a failed action is logged and does not roll the transition back.

use async_trait::async_trait;
use lifecycle_types::{ActionSpec, EntityRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher does not understand the action type
    #[error("unsupported action type '{0}'")]
    Unsupported(String),

    /// The action ran and failed
    #[error("action '{action_type}' failed: {reason}")]
    Failed { action_type: String, reason: String },
}

#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, entity: &EntityRef, action: &ActionSpec)
        -> Result<(), DispatchError>;
}

/// Dispatcher that records every action in the log and succeeds.
/// The default when a host wires no dispatcher of its own.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

impl LoggingDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionDispatcher for LoggingDispatcher {
    async fn dispatch(
        &self,
        entity: &EntityRef,
        action: &ActionSpec,
    ) -> Result<(), DispatchError> {
        tracing::info!(
            entity = %entity,
            action_type = %action.action_type,
            params = action.params.len(),
            "action dispatched"
        );
        Ok(())
    }
}
