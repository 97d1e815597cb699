//! # Repository Module
//!
//! Database repository implementations for Tillbook.
//!
//! Repositories wrap pool-level reads and single-row writes behind a
//! typed API. Multi-step workflows (sale recording, order lifecycle,
//! reversals, journal posting) live in [`crate::manager`]; repositories
//! additionally expose connection-scoped helpers those managers call
//! inside their transactions.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product maintenance and stock movements
//! - [`actor::ActorRepository`] - Shop users and actor-code resolution
//! - [`audit::AuditRepository`] - Append-only control logs
//! - [`report::ReportRepository`] - Read-only reporting queries

pub mod actor;
pub mod audit;
pub mod product;
pub mod report;
