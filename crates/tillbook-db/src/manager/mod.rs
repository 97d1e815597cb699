//! # Workflow Managers
//!
//! The transactional core of Tillbook. Each manager owns one workflow and
//! runs every public operation as a single SQLite transaction:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI action (button press)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  manager operation ── pool.begin() ──► sub-steps on one connection      │
//! │       │                                  (repositories, journal,        │
//! │       │                                   audit appends)                │
//! │       ▼                                                                 │
//! │  Ok(value)  → tx.commit()                                               │
//! │  Err(e)     → tx dropped ⇒ rollback; PosError returned to the caller    │
//! │                                                                         │
//! │  No partial state ever survives a failed operation.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`journal::JournalRecorder`] - balanced double-entry posting
//! - [`sale::SalesManager`] - direct sale recording
//! - [`order::OrderManager`] - customer-order lifecycle
//! - [`reversal::ReversalManager`] - sale-reversal approval pipeline

pub mod journal;
pub mod order;
pub mod reversal;
pub mod sale;

use crate::error::DbError;
use tillbook_core::PosError;

/// Wraps a persistence failure with the name of the workflow step that
/// hit it; the step name is part of the user-visible message.
pub(crate) fn step<E: Into<DbError>>(name: &'static str) -> impl Fn(E) -> PosError {
    move |e| PosError::Database(format!("{name}: {}", e.into()))
}
