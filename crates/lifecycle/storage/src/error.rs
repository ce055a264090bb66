//! Storage error types

use lifecycle_types::LifecycleError;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was hit
    #[error("conflict: {0}")]
    Conflict(String),

    /// The write would break an append-only or ordering invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A keyed lock could not be acquired within the timeout
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// The backend itself failed
    #[error("backend error: {0}")]
    Backend(String),
}

/// Callers above the storage crate see lifecycle errors. Lock timeouts
/// surface as concurrency conflicts; broken invariants as immutability
/// violations. Uniqueness conflicts are mapped by the engine where it
/// knows which entity collided, so the fallback here is the backend
/// bucket.
impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LockTimeout(msg) => LifecycleError::ConcurrencyConflict(msg),
            StorageError::InvariantViolation(msg) => LifecycleError::ImmutabilityViolation(msg),
            StorageError::NotFound(msg)
            | StorageError::Conflict(msg)
            | StorageError::Backend(msg) => LifecycleError::Backend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_becomes_concurrency_conflict() {
        let err: LifecycleError = StorageError::LockTimeout("entity document:doc-1".into()).into();
        assert_eq!(err.code(), "concurrency_conflict");
    }

    #[test]
    fn test_invariant_violation_becomes_immutability_violation() {
        let err: LifecycleError =
            StorageError::InvariantViolation("history rewrite".into()).into();
        assert_eq!(err.code(), "immutability_violation");
    }
}
