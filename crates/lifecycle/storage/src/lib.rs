//! Storage layer for the lifecycle engine
//!
//! Defines the async traits the engine persists through, in-memory
//! adapters for tests and embedded use, and the keyed lock manager
//! that serializes writes per entity and per counter scope.
//!
//! The traits are deliberately narrow. There is no `delete` on
//! instances and no `update` on history: the operations a backend
//! cannot express are the operations the engine must never perform.

#![deny(unsafe_code)]

mod error;
mod lock;
mod memory;
mod traits;

pub use error::*;
pub use lock::*;
pub use memory::*;
pub use traits::*;
