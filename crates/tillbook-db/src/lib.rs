//! # tillbook-db: Persistence Layer for Tillbook
//!
//! SQLite storage plus the transactional workflow managers for the
//! Tillbook point-of-sale ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillbook Data Flow                               │
//! │                                                                         │
//! │  Caller (UI action / test)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   tillbook-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │   Managers    │    │ Repositories │   │   │
//! │  │   │   (pool.rs)   │    │ (manager/*)   │    │(repository/*)│   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ Sales/Order/  │───►│ Product      │   │   │
//! │  │   │ DbConfig      │    │ Reversal/     │    │ Actor        │   │   │
//! │  │   │ Migrations    │    │ Journal       │    │ Audit/Report │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL), migrations embedded from migrations/sqlite/     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every public manager operation is one transaction: it commits whole
//! or rolls back whole, and returns `Result<T, PosError>` with a message
//! the UI can surface directly.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, and the [`Database`] handle
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - [`DbError`] and its mapping into `PosError`
//! - [`repository`] - Row-level access (products, actors, audit, reports)
//! - [`manager`] - Transactional workflows (sales, orders, reversals, journal)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("data/tillbook.db")).await?;
//!
//! let receipt_no = db
//!     .sales()
//!     .record_sale("jane", &cart, PaymentMethod::Cash, 1_050_000)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod manager;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::DbError;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::actor::ActorRepository;
pub use repository::audit::AuditRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;

// Manager re-exports for convenience
pub use manager::journal::JournalRecorder;
pub use manager::order::OrderManager;
pub use manager::reversal::ReversalManager;
pub use manager::sale::SalesManager;
