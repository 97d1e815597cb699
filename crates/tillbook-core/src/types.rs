//! # Domain Types
//!
//! Core domain types used throughout Tillbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐    │
//! │  │   Product    │   │     Sale     │   │         Order            │    │
//! │  │ ──────────── │   │ ──────────── │   │ ──────────────────────── │    │
//! │  │ code (key)   │   │ receipt_no   │   │ order_id                 │    │
//! │  │ quantity     │   │ total_cents  │   │ amount_cents             │    │
//! │  │ cost/prices  │   │ SaleItem*    │   │ OrderItem* OrderPayment  │    │
//! │  └──────────────┘   └──────────────┘   └──────────────────────────┘    │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐    │
//! │  │SalesReversal │   │ JournalEntry │   │ Audit log rows           │    │
//! │  │ ──────────── │   │ ──────────── │   │ ──────────────────────── │    │
//! │  │ state machine│   │ JournalLine* │   │ order / product control  │    │
//! │  │ actor stamps │   │ Σd == Σc     │   │ / sales control          │    │
//! │  └──────────────┘   └──────────────┘   └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row structs mirror the database schema one to one; all monetary columns
//! are integer cents (see [`crate::money`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::WHOLESALE_QTY_THRESHOLD;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// Products are never deleted, only deactivated; sale and order rows keep
/// referring to the code of a deactivated product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Business key, unique across the shop.
    pub code: String,

    /// Display name shown on receipts and order sheets.
    pub name: String,

    /// Current stock level.
    ///
    /// The direct-sale path decrements this without a sufficiency check
    /// and can drive it negative; only order delivery guards the
    /// decrement. See the stock-movement methods in the db layer.
    pub quantity: i64,

    /// Unit cost in cents (basis for cost-of-goods-sold postings).
    pub cost_cents: i64,

    /// Unit price in cents for bulk quantities.
    pub wholesale_price_cents: i64,

    /// Unit price in cents for over-the-counter quantities.
    pub retail_price_cents: i64,

    /// Reorder threshold for the low-stock report.
    pub min_stock_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit cost as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the unit price applicable to `quantity`.
    ///
    /// Retail price applies below [`WHOLESALE_QTY_THRESHOLD`] units,
    /// wholesale price from the threshold up.
    pub fn price_for_quantity(&self, quantity: i64) -> Money {
        if quantity >= WHOLESALE_QTY_THRESHOLD {
            Money::from_cents(self.wholesale_price_cents)
        } else {
            Money::from_cents(self.retail_price_cents)
        }
    }

    /// Whether the stock level has fallen to the reorder threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Tender type for sale and order payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Mobile money transfer.
    Mpesa,
    /// Card payment on external terminal.
    ExternalCard,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale transaction.
///
/// Created once per `record_sale`; `total_cents` is mutated downward only
/// by reversal posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    /// Receipt number, `{actor_code}{YYMMDDHHMMSS}` (see [`crate::receipt`]).
    pub receipt_no: String,
    pub total_cents: i64,
    /// Username of the cashier who recorded the sale.
    pub cashier: String,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale.
///
/// Product code/name/price are snapshots frozen at time of sale; the sale
/// history survives later product edits. Quantity and unit price are only
/// ever reduced, by reversal posting, and never below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub receipt_no: String,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub cashier: String,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// A payment towards a sale. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub receipt_no: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Input line for [`record_sale`]: one product in the cart.
///
/// [`record_sale`]: https://docs.rs/tillbook-db
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl SaleLineInput {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order lifecycle status. `Pending → Delivered` is the only transition;
/// pending orders may instead be deleted outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Delivered,
}

/// A customer order.
///
/// `amount_cents` is the authoritative running total, adjusted by item
/// add/edit and never by delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub order_id: String,
    pub customer_name: String,
    pub contact: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub amount_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A line item on an order. Appended on add, updated in place on edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Settlement row for an order, one per order.
///
/// Invariant: `balance_cents == total_cents - paid_cents` at all times,
/// and `total_cents` tracks `Order.amount_cents` in lock-step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderPayment {
    pub order_id: String,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl OrderPayment {
    /// Checks the settlement arithmetic invariant.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.balance_cents == self.total_cents - self.paid_cents && self.balance_cents >= 0
    }

    #[inline]
    pub fn is_fully_paid(&self) -> bool {
        self.balance_cents == 0
    }
}

/// Input line for order creation / item addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl OrderItemInput {
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sale Reversals
// =============================================================================

/// Approval state of a sale reversal.
///
/// Strictly forward-moving:
/// `Tagged → Authorized → Posted` (terminal, immutable) or
/// `Tagged → Rejected → (hard delete)`.
///
/// The state is explicit rather than implied by which actor-stamp columns
/// happen to be set; the stamps below record *who* drove each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ReversalState {
    Tagged,
    Authorized,
    Rejected,
    Posted,
}

/// A correction workflow entry undoing part or all of a recorded sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesReversal {
    pub id: String,
    pub receipt_no: String,
    pub product_code: String,
    /// Units to take back.
    pub quantity: i64,
    /// Unit price reduction applied to the sale item on posting.
    pub unit_price_cents: i64,
    /// Cash refunded to the customer.
    pub refund_cents: i64,
    pub state: ReversalState,
    pub tagged_by: String,
    pub authorized_by: Option<String>,
    pub rejected_by: Option<String>,
    pub posted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesReversal {
    #[inline]
    pub fn refund(&self) -> Money {
        Money::from_cents(self.refund_cents)
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Ledger account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// A named ledger account. Provisioned idempotently on first posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub name: String,
    pub account_type: AccountType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata used to provision an account on demand.
#[derive(Debug, Clone)]
pub struct AccountSpec {
    pub name: String,
    pub account_type: AccountType,
    pub description: String,
}

impl AccountSpec {
    pub fn new(
        name: impl Into<String>,
        account_type: AccountType,
        description: impl Into<String>,
    ) -> Self {
        AccountSpec {
            name: name.into(),
            account_type,
            description: description.into(),
        }
    }
}

/// A double-entry journal entry header, keyed by a reference string
/// (receipt number, order id, treasury reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JournalEntry {
    pub id: String,
    pub reference: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A debit or credit line under a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JournalLine {
    pub id: String,
    pub entry_id: String,
    pub account: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub description: Option<String>,
}

/// Input for one journal line.
#[derive(Debug, Clone)]
pub struct JournalLineInput {
    pub account: String,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
}

impl JournalLineInput {
    /// A pure debit line.
    pub fn debit(account: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        JournalLineInput {
            account: account.into(),
            debit: amount,
            credit: Money::zero(),
            description: Some(description.into()),
        }
    }

    /// A pure credit line.
    pub fn credit(
        account: impl Into<String>,
        amount: Money,
        description: impl Into<String>,
    ) -> Self {
        JournalLineInput {
            account: account.into(),
            debit: Money::zero(),
            credit: amount,
            description: Some(description.into()),
        }
    }
}

/// Checks the double-entry balance rule over a prospective line set.
pub fn lines_are_balanced(lines: &[JournalLineInput]) -> bool {
    let debits: Money = lines.iter().map(|l| l.debit).sum();
    let credits: Money = lines.iter().map(|l| l.credit).sum();
    debits == credits
}

// =============================================================================
// Audit Log Rows
// =============================================================================

/// One row per order mutation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLog {
    pub id: i64,
    pub order_id: String,
    pub actor: String,
    pub description: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// One row per stock movement. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductControlLog {
    pub id: i64,
    pub product_code: String,
    pub actor: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One row per sale-side action (recording, reversal transitions).
/// Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesControlLog {
    pub id: i64,
    pub actor: String,
    pub description: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-actor running total of cash collected, reconciled at end of day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashierControl {
    pub actor_code: String,
    pub total_cents: i64,
    pub updated_at: DateTime<Utc>,
}

/// An actor (shop user) who can record sales and drive workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Actor {
    pub username: String,
    /// Short code prefixed onto receipt numbers.
    pub code: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(quantity: i64) -> Product {
        Product {
            code: "P002".to_string(),
            name: "Test".to_string(),
            quantity,
            cost_cents: 700_000,
            wholesale_price_cents: 900_000,
            retail_price_cents: 1_000_000,
            min_stock_level: 2,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn retail_price_below_threshold() {
        let p = product(50);
        assert_eq!(p.price_for_quantity(1).cents(), 1_000_000);
        assert_eq!(p.price_for_quantity(9).cents(), 1_000_000);
    }

    #[test]
    fn wholesale_price_from_threshold() {
        let p = product(50);
        assert_eq!(p.price_for_quantity(10).cents(), 900_000);
        assert_eq!(p.price_for_quantity(100).cents(), 900_000);
    }

    #[test]
    fn low_stock_detection() {
        assert!(product(2).is_low_stock());
        assert!(product(0).is_low_stock());
        assert!(!product(3).is_low_stock());
    }

    #[test]
    fn order_payment_consistency() {
        let now = Utc::now();
        let good = OrderPayment {
            order_id: "o1".to_string(),
            total_cents: 10_000,
            paid_cents: 4_000,
            balance_cents: 6_000,
            updated_at: now,
        };
        assert!(good.is_consistent());
        assert!(!good.is_fully_paid());

        let drifted = OrderPayment {
            balance_cents: 5_000,
            ..good.clone()
        };
        assert!(!drifted.is_consistent());

        let settled = OrderPayment {
            paid_cents: 10_000,
            balance_cents: 0,
            ..good
        };
        assert!(settled.is_consistent());
        assert!(settled.is_fully_paid());
    }

    #[test]
    fn journal_balance_rule() {
        let hundred = Money::from_cents(10_000);
        let balanced = vec![
            JournalLineInput::debit("Cash", hundred, "cash in"),
            JournalLineInput::credit("Sales Revenue", hundred, "revenue"),
        ];
        assert!(lines_are_balanced(&balanced));

        let unbalanced = vec![
            JournalLineInput::debit("Cash", hundred, "cash in"),
            JournalLineInput::credit("Sales Revenue", Money::from_cents(9_999), "revenue"),
        ];
        assert!(!lines_are_balanced(&unbalanced));
    }

    #[test]
    fn sale_item_line_total() {
        let item = SaleItem {
            id: "i1".to_string(),
            receipt_no: "AB260101120000".to_string(),
            product_code: "P001".to_string(),
            product_name: "Widget".to_string(),
            quantity: 2,
            unit_price_cents: 25_000,
            cashier: "jane".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(item.line_total().cents(), 50_000);
    }
}
