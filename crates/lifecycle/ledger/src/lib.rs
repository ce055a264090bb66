//! Append-Only History Ledger for docflow
//!
//! Wraps a [`HistoryStore`] behind a facade whose entire write surface
//! is `append`. Sequence numbers and timestamps are assigned here, not
//! by callers, and every append is checked against the causal chain:
//! the first record for an entity must be its initialization, and each
//! later record must depart from the state the previous one arrived at.
//!
//! Records themselves carry no mutable accessor, so the absence of
//! update and delete is a property of the types, not of reviewer
//! discipline. Corrections happen the way they do in accounting, with
//! a compensating record.

#![deny(unsafe_code)]

use chrono::Utc;
use lifecycle_storage::{HistoryStore, StorageError};
use lifecycle_types::{EntityRef, HistoryEntry, HistoryRecord, LifecycleError};
use std::sync::Arc;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised by the ledger facade
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The entry does not extend the entity's causal chain
    #[error("chain violation for entity {entity}: {reason}")]
    ChainViolation { entity: EntityRef, reason: String },

    /// The underlying store failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<LedgerError> for LifecycleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ChainViolation { entity, reason } => {
                LifecycleError::ImmutabilityViolation(format!("entity {}: {}", entity, reason))
            }
            LedgerError::Storage(err) => err.into(),
        }
    }
}

/// The append-only history ledger
pub struct HistoryLedger {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Seal an entry and append it to the entity's history.
    ///
    /// Assigns the next sequence number and the recorded-at timestamp,
    /// after verifying the entry continues the chain. The caller runs
    /// this inside the engine's per-entity lock, so the read-check-append
    /// is not racy.
    pub async fn append(&self, entry: HistoryEntry) -> LedgerResult<HistoryRecord> {
        let existing = self.store.list(&entry.entity).await?;

        match existing.last() {
            None => {
                if entry.from_state.is_some() {
                    return Err(LedgerError::ChainViolation {
                        entity: entry.entity.clone(),
                        reason: "first record must be an initialization".into(),
                    });
                }
            }
            Some(last) => {
                if entry.from_state.is_none() {
                    return Err(LedgerError::ChainViolation {
                        entity: entry.entity.clone(),
                        reason: "entity is already initialized".into(),
                    });
                }
                if entry.from_state.as_ref() != Some(last.to_state()) {
                    return Err(LedgerError::ChainViolation {
                        entity: entry.entity.clone(),
                        reason: format!(
                            "entry departs from '{}' but the chain ends at '{}'",
                            entry.from_state.as_ref().map(|s| s.0.as_str()).unwrap_or(""),
                            last.to_state()
                        ),
                    });
                }
            }
        }

        let record = HistoryRecord::sealed(entry, existing.len() as u64, Utc::now());
        self.store.append(record.clone()).await?;
        tracing::info!(
            entity = %record.entity(),
            sequence = record.sequence(),
            to_state = %record.to_state(),
            "history record appended"
        );
        Ok(record)
    }

    /// The entity's full history in append order
    pub async fn for_entity(&self, entity: &EntityRef) -> LedgerResult<Vec<HistoryRecord>> {
        Ok(self.store.list(entity).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_storage::InMemoryHistoryStore;
    use lifecycle_types::{ActorId, StateCode};

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(Arc::new(InMemoryHistoryStore::new()))
    }

    fn doc() -> EntityRef {
        EntityRef::new("document", "doc-1")
    }

    fn init_entry() -> HistoryEntry {
        HistoryEntry::initialization(doc(), StateCode::new("draft"), ActorId::new("alice"))
    }

    fn step(from: &str, to: &str, name: &str) -> HistoryEntry {
        HistoryEntry::transition(
            doc(),
            StateCode::new(from),
            StateCode::new(to),
            name,
            ActorId::new("alice"),
        )
    }

    #[tokio::test]
    async fn test_append_assigns_consecutive_sequences() {
        let ledger = ledger();
        let first = ledger.append(init_entry()).await.unwrap();
        let second = ledger.append(step("draft", "review", "Submit")).await.unwrap();
        let third = ledger.append(step("review", "posted", "Post")).await.unwrap();

        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
        assert_eq!(third.sequence(), 2);
    }

    #[tokio::test]
    async fn test_first_record_must_be_initialization() {
        let ledger = ledger();
        let result = ledger.append(step("draft", "review", "Submit")).await;
        assert!(matches!(result, Err(LedgerError::ChainViolation { .. })));
    }

    #[tokio::test]
    async fn test_second_initialization_is_rejected() {
        let ledger = ledger();
        ledger.append(init_entry()).await.unwrap();
        let result = ledger.append(init_entry()).await;
        assert!(matches!(result, Err(LedgerError::ChainViolation { .. })));
    }

    #[tokio::test]
    async fn test_entry_must_depart_from_chain_head() {
        let ledger = ledger();
        ledger.append(init_entry()).await.unwrap();
        ledger.append(step("draft", "review", "Submit")).await.unwrap();

        // the chain ends at "review", departing from "draft" is a rewrite
        let result = ledger.append(step("draft", "posted", "Post")).await;
        assert!(matches!(result, Err(LedgerError::ChainViolation { .. })));
    }

    #[tokio::test]
    async fn test_chain_violation_surfaces_as_immutability_violation() {
        let ledger = ledger();
        let err = ledger
            .append(step("draft", "review", "Submit"))
            .await
            .unwrap_err();
        let err: LifecycleError = err.into();
        assert_eq!(err.code(), "immutability_violation");
    }

    #[tokio::test]
    async fn test_for_entity_returns_append_order() {
        let ledger = ledger();
        ledger.append(init_entry()).await.unwrap();
        ledger.append(step("draft", "review", "Submit")).await.unwrap();

        let records = ledger.for_entity(&doc()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_initialization());
        assert_eq!(records[1].from_state(), Some(&StateCode::new("draft")));
        assert_eq!(records[1].transition(), Some("Submit"));
    }

    #[tokio::test]
    async fn test_unknown_entity_has_empty_history() {
        let ledger = ledger();
        let records = ledger.for_entity(&doc()).await.unwrap();
        assert!(records.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any walk through state names appends cleanly as long as
            /// each entry departs from the previous arrival, and the
            /// resulting ledger is gap-free and in causal order.
            #[test]
            fn prop_chain_stays_causal(states in proptest::collection::vec("[a-z]{1,8}", 1..12)) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let ledger = ledger();
                    let mut previous: Option<String> = None;
                    for state in &states {
                        let entry = match &previous {
                            None => HistoryEntry::initialization(
                                doc(),
                                StateCode::new(state.clone()),
                                ActorId::new("alice"),
                            ),
                            Some(from) => HistoryEntry::transition(
                                doc(),
                                StateCode::new(from.clone()),
                                StateCode::new(state.clone()),
                                "Step",
                                ActorId::new("alice"),
                            ),
                        };
                        ledger.append(entry).await.unwrap();
                        previous = Some(state.clone());
                    }

                    let records = ledger.for_entity(&doc()).await.unwrap();
                    assert_eq!(records.len(), states.len());
                    for pair in records.windows(2) {
                        assert_eq!(pair[1].sequence(), pair[0].sequence() + 1);
                        assert_eq!(pair[1].from_state(), Some(pair[0].to_state()));
                    }
                });
            }
        }
    }
}
