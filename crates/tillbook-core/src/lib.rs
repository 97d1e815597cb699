//! # tillbook-core: Pure Business Logic for Tillbook
//!
//! This crate is the heart of the Tillbook point-of-sale core. It contains
//! all business logic as pure functions and types with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillbook Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        UI / export / print layers (external, out of scope)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tillbook-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────────┐  │   │
//! │  │   │   types   │ │   money   │ │ validation│ │    receipt    │  │   │
//! │  │   │ Product   │ │   Money   │ │   rules   │ │   numbering   │  │   │
//! │  │   │ Sale/Order│ │  (cents)  │ │   checks  │ │               │  │   │
//! │  │   └───────────┘ └───────────┘ └───────────┘ └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   tillbook-db (Database Layer)                  │   │
//! │  │        SQLite queries, migrations, repositories, managers       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Order, SalesReversal, journal rows)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`receipt`] - Receipt number format

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod receipt;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{PosError, PosResult, ValidationError};
pub use money::Money;
pub use receipt::receipt_number;
pub use types::{
    Account, AccountSpec, AccountType, Actor, CashierControl, JournalEntry, JournalLine,
    JournalLineInput, Order, OrderItem, OrderItemInput, OrderLog, OrderPayment, OrderStatus,
    Payment, PaymentMethod, Product, ProductControlLog, ReversalState, Sale, SaleItem,
    SaleLineInput, SalesControlLog, SalesReversal,
};

// =============================================================================
// Business Constants
// =============================================================================

/// Quantity from which the wholesale unit price applies; below it the
/// retail price does.
pub const WHOLESALE_QTY_THRESHOLD: i64 = 10;

/// Ledger account charged with the inventory cost of goods sold.
pub const ACCOUNT_COGS: &str = "Cost of Goods Sold";

/// Ledger account credited with revenue at sale price.
pub const ACCOUNT_SALES_REVENUE: &str = "Sales Revenue";

/// Ledger account carrying stock at cost.
pub const ACCOUNT_INVENTORY: &str = "Inventory";

/// Cashier cash-control account, debited at sale price so the ledger can
/// be reconciled against physical cash counts. Revenue is intentionally
/// booked twice, here and under Sales Revenue; both sides of that
/// convention are load-bearing for end-of-day reconciliation.
pub const ACCOUNT_SALES_CONTROL: &str = "Sales Control";
