//! Lifecycle Domain Types for docflow
//!
//! The lifecycle engine is metadata-driven: workflows, states and
//! transitions are **data**, authored elsewhere and bound to arbitrary
//! business entities at runtime. This crate holds the vocabulary every
//! other lifecycle crate speaks:
//!
//! - **WorkflowDefinition**: a named, entity-type-scoped graph of states
//!   and guarded transitions. Immutable once validated.
//! - **WorkflowInstance**: the runtime binding of one external entity
//!   (an opaque `EntityRef`) to one workflow and its current state.
//! - **GuardExpr**: a declarative condition AST stored as data and
//!   evaluated against a context map at transition time.
//! - **HistoryRecord**: one immutable entry in the append-only audit
//!   ledger. No mutable accessor exists — tampering is unrepresentable,
//!   not merely checked.
//! - **SequenceDefinition / ScopeKey**: scoped, gap-free document
//!   numbering metadata.
//!
//! # Design Principles
//!
//! 1. Entities are referenced by `(type tag, id)` pairs, never by
//!    pointers into engine internals.
//! 2. Guards are validated structurally at metadata-save time so
//!    evaluation is total at transition time.
//! 3. Every failure carries a stable machine-readable code plus
//!    structured details, so callers can render precise guidance.

#![deny(unsafe_code)]

mod definition;
mod entity;
mod errors;
mod guard;
mod instance;
mod sequence;

pub use definition::*;
pub use entity::*;
pub use errors::*;
pub use guard::*;
pub use instance::*;
pub use sequence::*;
