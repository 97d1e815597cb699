//! # Sales Manager
//!
//! Direct (counter) sale recording.
//!
//! ## record_sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One transaction, ten steps, all-or-nothing:                            │
//! │                                                                         │
//! │   1. resolve cashier to actor code            (outside tx, read-only)  │
//! │   2. generate receipt number                                            │
//! │   3. total = Σ quantity × unit price                                    │
//! │   4. insert sale header                                                 │
//! │   5. per item: sale_items row, UNGUARDED stock decrement,               │
//! │      product control log                                                │
//! │   6. insert payment row                                                 │
//! │   7. cost of goods sold from the stock-cost lookup                      │
//! │   8. 4-line balanced journal entry                                      │
//! │   9. cashier running-total upsert + sales control log                   │
//! │  10. commit                                                             │
//! │                                                                         │
//! │  Any failure at 4-9 rolls the whole attempt back; the error message     │
//! │  names the step that failed.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Accounting convention
//! Revenue is booked twice at sale price - credit Sales Revenue and debit
//! Sales Control - so the control side can be reconciled against the
//! cashier's physical cash count. COGS/Inventory carry the cost side.
//! Do not "simplify" this into a single revenue line.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbError;
use crate::manager::journal::post_entry;
use crate::manager::step;
use crate::repository::actor::ActorRepository;
use crate::repository::{audit, product};
use tillbook_core::validation::{validate_amount_cents, validate_sale_lines};
use tillbook_core::{
    receipt_number, AccountSpec, AccountType, JournalLineInput, Money, Payment, PaymentMethod,
    PosResult, Sale, SaleItem, SaleLineInput, ACCOUNT_COGS, ACCOUNT_INVENTORY,
    ACCOUNT_SALES_CONTROL, ACCOUNT_SALES_REVENUE,
};

/// Account metadata for the sale posting; provisioned on first use.
fn sale_accounts() -> Vec<AccountSpec> {
    vec![
        AccountSpec::new(ACCOUNT_COGS, AccountType::Expense, "Inventory cost of goods sold"),
        AccountSpec::new(ACCOUNT_SALES_CONTROL, AccountType::Revenue, "Cashier cash control"),
        AccountSpec::new(ACCOUNT_INVENTORY, AccountType::Asset, "Stock at cost"),
        AccountSpec::new(ACCOUNT_SALES_REVENUE, AccountType::Revenue, "Revenue at sale price"),
    ]
}

/// Workflow manager for direct sales.
#[derive(Debug, Clone)]
pub struct SalesManager {
    pool: SqlitePool,
}

impl SalesManager {
    /// Creates a new SalesManager.
    pub fn new(pool: SqlitePool) -> Self {
        SalesManager { pool }
    }

    /// Records a completed counter sale and returns its receipt number.
    ///
    /// ## Arguments
    /// * `username` - cashier recording the sale
    /// * `items` - cart lines (snapshotted product code/name/price)
    /// * `method` - tender type
    /// * `amount_paid_cents` - amount collected from the customer
    ///
    /// ## Failure
    /// Unknown cashier fails before anything is written; any later
    /// failure rolls back every row of the attempt.
    pub async fn record_sale(
        &self,
        username: &str,
        items: &[SaleLineInput],
        method: PaymentMethod,
        amount_paid_cents: i64,
    ) -> PosResult<String> {
        validate_sale_lines(items)?;
        validate_amount_cents("amount_paid", amount_paid_cents)?;

        let actor_code = ActorRepository::new(self.pool.clone())
            .lookup_actor_code(username)
            .await?;

        let now = Utc::now();
        let receipt_no = receipt_number(&actor_code, now);
        let total: Money = items.iter().map(SaleLineInput::line_total).sum();

        debug!(receipt_no = %receipt_no, cashier = %username, total = %total, "Recording sale");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        // Sale header. A same-second sale by the same actor collides on
        // the receipt-number key and fails here (documented limitation of
        // the receipt format).
        sqlx::query(
            r#"
            INSERT INTO sales (receipt_no, total_cents, cashier, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&receipt_no)
        .bind(total.cents())
        .bind(username)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("recording sale header"))?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, receipt_no, product_code, product_name,
                    quantity, unit_price_cents, cashier, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&receipt_no)
            .bind(&item.product_code)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(username)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(step("recording sale items"))?;

            // Unguarded on purpose: the counter sale never blocks on
            // stock. Zero affected rows still means the product row is
            // missing altogether.
            let found = product::decrement_stock_unguarded(&mut tx, &item.product_code, item.quantity)
                .await
                .map_err(step("adjusting stock"))?;
            if !found {
                return Err(tillbook_core::PosError::not_found(
                    "Product",
                    &item.product_code,
                ));
            }

            audit::append_product_log(
                &mut tx,
                &item.product_code,
                username,
                &format!("Sold {} units on receipt {}", item.quantity, receipt_no),
            )
            .await
            .map_err(step("logging stock movement"))?;
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, receipt_no, method, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&receipt_no)
        .bind(method)
        .bind(amount_paid_cents)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("recording payment"))?;

        let cost_lines: Vec<(String, i64)> = items
            .iter()
            .map(|i| (i.product_code.clone(), i.quantity))
            .collect();
        let cost = product::total_cost(&mut tx, &cost_lines)
            .await
            .map_err(step("computing cost of goods sold"))?;

        let lines = vec![
            JournalLineInput::debit(ACCOUNT_COGS, cost, "Cost of goods sold"),
            JournalLineInput::debit(ACCOUNT_SALES_CONTROL, total, "Cash due from cashier"),
            JournalLineInput::credit(ACCOUNT_INVENTORY, cost, "Stock issued at cost"),
            JournalLineInput::credit(ACCOUNT_SALES_REVENUE, total, "Revenue at sale price"),
        ];
        post_entry(
            &mut tx,
            &sale_accounts(),
            &lines,
            &receipt_no,
            &format!("Sale {receipt_no}"),
        )
        .await?;

        // Cashier control: running cash total per actor.
        sqlx::query(
            r#"
            INSERT INTO cashier_controls (actor_code, total_cents, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(actor_code) DO UPDATE SET
                total_cents = total_cents + excluded.total_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&actor_code)
        .bind(total.cents())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("updating cashier control"))?;

        audit::append_sales_log(
            &mut tx,
            username,
            &format!("Recorded sale {receipt_no}"),
            total.cents(),
        )
        .await
        .map_err(step("logging sale"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(receipt_no = %receipt_no, cashier = %username, total = %total, items = items.len(), "Sale recorded");

        Ok(receipt_no)
    }

    /// Gets a sale header by receipt number.
    pub async fn get_sale(&self, receipt_no: &str) -> PosResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            "SELECT receipt_no, total_cents, cashier, created_at FROM sales WHERE receipt_no = ?1",
        )
        .bind(receipt_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(sale)
    }

    /// Gets the line items of a sale, for receipt rendering.
    pub async fn get_items(&self, receipt_no: &str) -> PosResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, receipt_no, product_code, product_name,
                   quantity, unit_price_cents, cashier, created_at
            FROM sale_items
            WHERE receipt_no = ?1
            ORDER BY created_at
            "#,
        )
        .bind(receipt_no)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(items)
    }

    /// Gets the payments recorded against a sale.
    pub async fn get_payments(&self, receipt_no: &str) -> PosResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, receipt_no, method, amount_cents, created_at
            FROM payments
            WHERE receipt_no = ?1
            ORDER BY created_at
            "#,
        )
        .bind(receipt_no)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(payments)
    }

    /// Running cash total for one actor code, zero if none recorded yet.
    pub async fn cashier_total_cents(&self, actor_code: &str) -> PosResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT total_cents FROM cashier_controls WHERE actor_code = ?1")
                .bind(actor_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;

        Ok(total.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tillbook_core::{PosError, Product};

    async fn test_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.actors().insert("jane", "JK", None).await.unwrap();
        db.products().insert(&product("P001", 20, 15_000, 20_000, 25_000)).await.unwrap();
        db.products()
            .insert(&product("P002", 8, 700_000, 900_000, 1_000_000))
            .await
            .unwrap();
        db
    }

    fn product(code: &str, qty: i64, cost: i64, wholesale: i64, retail: i64) -> Product {
        let now = Utc::now();
        Product {
            code: code.to_string(),
            name: format!("Product {code}"),
            quantity: qty,
            cost_cents: cost,
            wholesale_price_cents: wholesale,
            retail_price_cents: retail,
            min_stock_level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(code: &str, name: &str, qty: i64, price: i64) -> SaleLineInput {
        SaleLineInput {
            product_code: code.to_string(),
            product_name: name.to_string(),
            quantity: qty,
            unit_price_cents: price,
        }
    }

    /// Two units of P001 at retail and one P002 at retail (quantity 1 is
    /// below the wholesale threshold) for 10,500.00 cash.
    #[tokio::test]
    async fn records_multi_line_cash_sale() {
        let db = test_db().await;

        let p2 = db.products().get_by_code("P002").await.unwrap().unwrap();
        let unit2 = p2.price_for_quantity(1);
        assert_eq!(unit2.cents(), 1_000_000); // retail applies below 10 units

        let cart = vec![
            line("P001", "Product P001", 2, 25_000),
            line("P002", "Product P002", 1, unit2.cents()),
        ];

        let receipt_no = db
            .sales()
            .record_sale("jane", &cart, PaymentMethod::Cash, 1_050_000)
            .await
            .unwrap();

        let sale = db.sales().get_sale(&receipt_no).await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 1_050_000);
        assert_eq!(sale.cashier, "jane");

        // Stock decremented per line.
        assert_eq!(
            db.products().get_by_code("P001").await.unwrap().unwrap().quantity,
            18
        );
        assert_eq!(
            db.products().get_by_code("P002").await.unwrap().unwrap().quantity,
            7
        );

        let items = db.sales().get_items(&receipt_no).await.unwrap();
        assert_eq!(items.len(), 2);

        let payments = db.sales().get_payments(&receipt_no).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount_cents, 1_050_000);
    }

    #[tokio::test]
    async fn receipt_number_carries_actor_code_and_timestamp() {
        let db = test_db().await;

        let receipt_no = db
            .sales()
            .record_sale(
                "jane",
                &[line("P001", "Product P001", 1, 25_000)],
                PaymentMethod::Cash,
                25_000,
            )
            .await
            .unwrap();

        assert!(receipt_no.starts_with("JK"));
        // JK + YYMMDDHHMMSS
        assert_eq!(receipt_no.len(), 2 + 12);
        assert!(receipt_no[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn posts_balanced_journal_entry_with_double_booked_revenue() {
        let db = test_db().await;

        let receipt_no = db
            .sales()
            .record_sale(
                "jane",
                &[line("P001", "Product P001", 2, 25_000)],
                PaymentMethod::Cash,
                50_000,
            )
            .await
            .unwrap();

        let entries = db.journal().entries_for_reference(&receipt_no).await.unwrap();
        assert_eq!(entries.len(), 1);

        let lines = db.journal().lines_for_entry(&entries[0].id).await.unwrap();
        assert_eq!(lines.len(), 4);

        let debits: i64 = lines.iter().map(|l| l.debit_cents).sum();
        let credits: i64 = lines.iter().map(|l| l.credit_cents).sum();
        assert_eq!(debits, credits);

        let by_account = |name: &str| lines.iter().find(|l| l.account == name).unwrap();
        assert_eq!(by_account(ACCOUNT_COGS).debit_cents, 2 * 15_000);
        assert_eq!(by_account(ACCOUNT_INVENTORY).credit_cents, 2 * 15_000);
        // Revenue booked at sale price on both sides of the convention.
        assert_eq!(by_account(ACCOUNT_SALES_REVENUE).credit_cents, 50_000);
        assert_eq!(by_account(ACCOUNT_SALES_CONTROL).debit_cents, 50_000);
    }

    #[tokio::test]
    async fn accumulates_cashier_control_total() {
        let db = test_db().await;
        let sales = db.sales();

        sales
            .record_sale("jane", &[line("P001", "Product P001", 1, 25_000)], PaymentMethod::Cash, 25_000)
            .await
            .unwrap();
        // Second sale in a later second; retry on the rare same-second
        // collision would hide what we're testing, so space the calls.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        sales
            .record_sale("jane", &[line("P001", "Product P001", 3, 25_000)], PaymentMethod::Cash, 75_000)
            .await
            .unwrap();

        assert_eq!(sales.cashier_total_cents("JK").await.unwrap(), 100_000);
    }

    #[tokio::test]
    async fn unknown_cashier_writes_nothing() {
        let db = test_db().await;

        let err = db
            .sales()
            .record_sale(
                "ghost",
                &[line("P001", "Product P001", 1, 25_000)],
                PaymentMethod::Cash,
                25_000,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::NotFound { .. }));

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    /// Atomicity: a failure halfway through (unknown product on the second
    /// line) must leave no sale, item, payment, stock or journal rows.
    #[tokio::test]
    async fn failed_sale_rolls_back_every_row() {
        let db = test_db().await;

        let cart = vec![
            line("P001", "Product P001", 2, 25_000),
            line("GHOST", "No Such Product", 1, 1_000),
        ];

        let err = db
            .sales()
            .record_sale("jane", &cart, PaymentMethod::Cash, 51_000)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::NotFound { .. }));

        for table in ["sales", "sale_items", "payments", "journal_entries"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(db.pool())
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty after rollback");
        }

        // P001's decrement from the first line was rolled back too.
        assert_eq!(
            db.products().get_by_code("P001").await.unwrap().unwrap().quantity,
            20
        );
    }

    /// The counter-sale path deliberately skips the stock guard; selling
    /// past available stock succeeds and drives the quantity negative.
    /// Order delivery is the guarded path. Pinned here so a future
    /// "cleanup" cannot silently unify the two.
    #[tokio::test]
    async fn direct_sale_can_oversell_stock() {
        let db = test_db().await;

        db.sales()
            .record_sale(
                "jane",
                &[line("P002", "Product P002", 9, 1_000_000)],
                PaymentMethod::Cash,
                9_000_000,
            )
            .await
            .unwrap();

        assert_eq!(
            db.products().get_by_code("P002").await.unwrap().unwrap().quantity,
            -1
        );
    }

    /// Sale items are keyed by (receipt, product): reversal posting
    /// reduces every row matching that pair, so a cart listing one
    /// product twice would let a 1-unit reversal cut the recorded
    /// quantity on both rows while restocking only once. Such carts are
    /// rejected outright before anything is written.
    #[tokio::test]
    async fn duplicate_product_lines_rejected_before_any_write() {
        let db = test_db().await;

        let cart = vec![
            line("P001", "Product P001", 2, 25_000),
            line("P001", "Product P001", 3, 25_000),
        ];

        let err = db
            .sales()
            .record_sale("jane", &cart, PaymentMethod::Cash, 125_000)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: P001 appears on more than one line");

        for table in ["sales", "sale_items", "payments"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(db.pool())
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty");
        }
        assert_eq!(
            db.products().get_by_code("P001").await.unwrap().unwrap().quantity,
            20
        );
    }

    #[tokio::test]
    async fn empty_cart_rejected() {
        let db = test_db().await;
        let err = db
            .sales()
            .record_sale("jane", &[], PaymentMethod::Cash, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
    }
}
