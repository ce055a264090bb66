//! Lifecycle Engine for docflow
//!
//! The orchestrating crate: binds metadata-defined workflows to
//! arbitrary business entities and drives their state transitions.
//!
//! - [`DefinitionRegistry`]: workflow definitions, validated when
//!   registered so the engine never meets broken metadata at runtime.
//! - [`EntityRegistry`] / [`EntityAccessor`]: the seam through which
//!   the engine sees entity types it has never heard of at compile
//!   time.
//! - [`RoleChecker`]: injected approval authority lookup; role storage
//!   lives outside the engine.
//! - [`ActionDispatcher`]: post-commit side effects. Dispatch failures
//!   are logged, never propagated; the transition has already
//!   committed.
//! - [`LifecycleEngine`]: initialize, transition, available
//!   transitions and history, with per-entity pessimistic locking.

#![deny(unsafe_code)]

mod actions;
mod engine;
mod entity;
mod registry;
mod roles;

pub use actions::*;
pub use engine::*;
pub use entity::*;
pub use registry::*;
pub use roles::*;
