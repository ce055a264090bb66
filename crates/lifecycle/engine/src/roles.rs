//! Approval authority lookup
//!
//! Role membership lives in the host system. The engine only ever asks
//! one question through this seam: does this actor hold this role.

use async_trait::async_trait;
use lifecycle_types::{ActorId, LifecycleResult, RoleId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[async_trait]
pub trait RoleChecker: Send + Sync {
    async fn has_role(&self, actor: &ActorId, role: &RoleId) -> LifecycleResult<bool>;
}

/// Role checker over a fixed grant table. Suits tests and embedded
/// deployments without an identity provider.
#[derive(Default)]
pub struct StaticRoleChecker {
    grants: RwLock<HashMap<ActorId, HashSet<RoleId>>>,
}

impl StaticRoleChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, actor: ActorId, role: RoleId) {
        if let Ok(mut grants) = self.grants.write() {
            grants.entry(actor).or_default().insert(role);
        }
    }
}

#[async_trait]
impl RoleChecker for StaticRoleChecker {
    async fn has_role(&self, actor: &ActorId, role: &RoleId) -> LifecycleResult<bool> {
        let grants = self
            .grants
            .read()
            .map_err(|_| lifecycle_types::LifecycleError::Backend("grant table lock poisoned".into()))?;
        Ok(grants.get(actor).is_some_and(|roles| roles.contains(role)))
    }
}
