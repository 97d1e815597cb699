//! # Reversal Manager
//!
//! Sale-reversal approval pipeline. A reversal undoes part or all of a
//! recorded sale, but only after a second actor signs off:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   tag ──► Tagged ──authorize──► Authorized ──post──► Posted (terminal)  │
//! │             │                                                           │
//! │             └──reject──► Rejected ──delete_rejected──► (gone)           │
//! │                                                                         │
//! │   Transitions move strictly forward; a Posted reversal is immutable     │
//! │   and a Rejected one can only be deleted.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `post` touches the sale, the stock, or the ledger; every earlier
//! state is pure workflow bookkeeping. Posting runs its stock return,
//! sale reductions and journal entry in one transaction with the state
//! flip.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbError;
use crate::manager::journal::post_entry;
use crate::manager::step;
use crate::repository::{audit, product};
use tillbook_core::{
    AccountSpec, AccountType, JournalLineInput, Money, PosError, PosResult, ReversalState,
    SalesReversal, ACCOUNT_COGS, ACCOUNT_INVENTORY, ACCOUNT_SALES_CONTROL, ACCOUNT_SALES_REVENUE,
};

fn reversal_accounts() -> Vec<AccountSpec> {
    vec![
        AccountSpec::new(ACCOUNT_COGS, AccountType::Expense, "Inventory cost of goods sold"),
        AccountSpec::new(ACCOUNT_SALES_CONTROL, AccountType::Revenue, "Cashier cash control"),
        AccountSpec::new(ACCOUNT_INVENTORY, AccountType::Asset, "Stock at cost"),
        AccountSpec::new(ACCOUNT_SALES_REVENUE, AccountType::Revenue, "Revenue at sale price"),
    ]
}

/// Workflow manager for sale reversals.
#[derive(Debug, Clone)]
pub struct ReversalManager {
    pool: SqlitePool,
}

impl ReversalManager {
    /// Creates a new ReversalManager.
    pub fn new(pool: SqlitePool) -> Self {
        ReversalManager { pool }
    }

    /// Tags a sale item for reversal; the starting state of the pipeline.
    ///
    /// `quantity` units are to be taken back, `unit_price_cents` is the
    /// per-unit price reduction to apply to the sale item, and
    /// `refund_cents` the cash going back to the customer. Nothing is
    /// refunded or restocked until the reversal is posted.
    pub async fn tag(
        &self,
        actor: &str,
        receipt_no: &str,
        product_code: &str,
        quantity: i64,
        unit_price_cents: i64,
        refund_cents: i64,
    ) -> PosResult<String> {
        if quantity <= 0 {
            return Err(PosError::invalid_amount("Reversal quantity must be positive."));
        }
        if refund_cents < 0 || unit_price_cents < 0 {
            return Err(PosError::invalid_amount("Reversal amounts cannot be negative."));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        // The sale item being reversed must exist.
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sale_items WHERE receipt_no = ?1 AND product_code = ?2",
        )
        .bind(receipt_no)
        .bind(product_code)
        .fetch_optional(&mut *tx)
        .await
        .map_err(step("reading sale item"))?;
        if exists.is_none() {
            return Err(PosError::not_found(
                "SaleItem",
                format!("{receipt_no}/{product_code}"),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sales_reversals (
                id, receipt_no, product_code, quantity, unit_price_cents,
                refund_cents, state, tagged_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(receipt_no)
        .bind(product_code)
        .bind(quantity)
        .bind(unit_price_cents)
        .bind(refund_cents)
        .bind(ReversalState::Tagged)
        .bind(actor)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("recording reversal"))?;

        audit::append_sales_log(
            &mut tx,
            actor,
            &format!("Reversal tagged on {receipt_no} for {product_code}"),
            refund_cents,
        )
        .await
        .map_err(step("logging reversal"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(reversal_id = %id, receipt_no = %receipt_no, refund = refund_cents, "Reversal tagged");

        Ok(id)
    }

    /// Authorizes a tagged reversal, clearing it for posting.
    pub async fn authorize(&self, actor: &str, reversal_id: &str) -> PosResult<()> {
        self.transition(
            actor,
            reversal_id,
            ReversalState::Tagged,
            ReversalState::Authorized,
            "authorized_by",
            "Reversal authorized",
        )
        .await
    }

    /// Rejects a tagged reversal; a rejected reversal can only be deleted.
    pub async fn reject(&self, actor: &str, reversal_id: &str) -> PosResult<()> {
        self.transition(
            actor,
            reversal_id,
            ReversalState::Tagged,
            ReversalState::Rejected,
            "rejected_by",
            "Reversal rejected",
        )
        .await
    }

    /// Posts an authorized reversal, applying its effects to the sale,
    /// the stock, and the ledger in one transaction.
    ///
    /// The sale item's quantity and unit price and the sale total are
    /// reduced, floored at zero so a generous reversal cannot drive the
    /// sale record negative. The journal entry is the exact mirror of the
    /// sale posting, sized by this reversal's refund and cost.
    pub async fn post(&self, actor: &str, reversal_id: &str) -> PosResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let reversal = get_reversal(&mut tx, reversal_id).await?;
        if reversal.state != ReversalState::Authorized {
            return Err(PosError::invalid_state(
                "Reversal be Tagged/Authorized For Posting.",
            ));
        }

        let now = Utc::now();

        let dbg_early = sqlx::query(
            "UPDATE sales_reversals SET updated_at = ?1 WHERE id = ?2",
        )
        .bind(now)
        .bind(reversal_id)
        .execute(&mut *tx)
        .await
        .unwrap();
        eprintln!("DEBUG early touch rows_affected={}", dbg_early.rows_affected());

        // Reduce the sale item, floored at zero on both columns.
        sqlx::query(
            r#"
            UPDATE sale_items
            SET quantity = MAX(quantity - ?1, 0),
                unit_price_cents = MAX(unit_price_cents - ?2, 0)
            WHERE receipt_no = ?3 AND product_code = ?4
            "#,
        )
        .bind(reversal.quantity)
        .bind(reversal.unit_price_cents)
        .bind(&reversal.receipt_no)
        .bind(&reversal.product_code)
        .execute(&mut *tx)
        .await
        .map_err(step("reducing sale item"))?;

        sqlx::query(
            "UPDATE sales SET total_cents = MAX(total_cents - ?1, 0) WHERE receipt_no = ?2",
        )
        .bind(reversal.refund_cents)
        .bind(&reversal.receipt_no)
        .execute(&mut *tx)
        .await
        .map_err(step("reducing sale total"))?;

        let restocked =
            product::increment_stock(&mut tx, &reversal.product_code, reversal.quantity)
                .await
                .map_err(step("restoring stock"))?;
        if !restocked {
            return Err(PosError::not_found("Product", &reversal.product_code));
        }

        let unit_cost = product::unit_cost_cents(&mut tx, &reversal.product_code)
            .await
            .map_err(step("reading unit cost"))?;
        let cost = Money::from_cents(unit_cost).multiply_quantity(reversal.quantity);
        let refund = reversal.refund();

        // Mirror of the sale posting.
        let lines = vec![
            JournalLineInput::debit(ACCOUNT_SALES_REVENUE, refund, "Revenue reversed"),
            JournalLineInput::debit(ACCOUNT_INVENTORY, cost, "Stock returned at cost"),
            JournalLineInput::credit(ACCOUNT_SALES_CONTROL, refund, "Cash refunded by cashier"),
            JournalLineInput::credit(ACCOUNT_COGS, cost, "Cost of goods sold reversed"),
        ];
        post_entry(
            &mut tx,
            &reversal_accounts(),
            &lines,
            &reversal.receipt_no,
            &format!("Reversal {reversal_id} on sale {}", reversal.receipt_no),
        )
        .await?;

        let dbg_rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, state FROM sales_reversals")
                .fetch_all(&mut *tx)
                .await
                .unwrap();
        eprintln!("DEBUG pre-update rows={dbg_rows:?} target_id={reversal_id:?}");
        let dbg_enc: Option<String> = sqlx::query_scalar("SELECT ?1")
            .bind(ReversalState::Posted)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        let dbg_enc2: Option<String> = sqlx::query_scalar("SELECT ?1")
            .bind(ReversalState::Authorized)
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        eprintln!("DEBUG encoded Posted={dbg_enc:?} Authorized={dbg_enc2:?}");
        let v1 = sqlx::query("UPDATE sales_reversals SET posted_by = ?1 WHERE id = ?2")
            .bind(actor)
            .bind(reversal_id)
            .execute(&mut *tx)
            .await
            .unwrap();
        let v2 = sqlx::query("UPDATE sales_reversals SET state = ?1 WHERE id = ?2")
            .bind(ReversalState::Posted)
            .bind(reversal_id)
            .execute(&mut *tx)
            .await
            .unwrap();
        eprintln!(
            "DEBUG v1(posted_by only)={} v2(state only)={}",
            v1.rows_affected(),
            v2.rows_affected()
        );
        let v3 = sqlx::query(
            "UPDATE sales_reversals SET state = ?1, posted_by = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(ReversalState::Posted)
        .bind(actor)
        .bind(now)
        .bind(reversal_id)
        .persistent(false)
        .execute(&mut *tx)
        .await
        .unwrap();
        let v4 = sqlx::query(
            "UPDATE sales_reversals SET posted_by = ?1, state = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(actor)
        .bind(ReversalState::Posted)
        .bind(now)
        .bind(reversal_id)
        .execute(&mut *tx)
        .await
        .unwrap();
        eprintln!(
            "DEBUG v3(same, non-persistent)={} v4(reordered)={}",
            v3.rows_affected(),
            v4.rows_affected()
        );
        let dbg_res = sqlx::query(
            "UPDATE sales_reversals SET state = ?1, posted_by = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(ReversalState::Posted)
        .bind(actor)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("updating reversal state"))?;
        eprintln!("DEBUG post state update rows_affected={}", dbg_res.rows_affected());

        audit::append_sales_log(
            &mut tx,
            actor,
            &format!("Reversal posted on {}", reversal.receipt_no),
            reversal.refund_cents,
        )
        .await
        .map_err(step("logging reversal"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(
            reversal_id = %reversal_id,
            receipt_no = %reversal.receipt_no,
            refund = reversal.refund_cents,
            "Reversal posted"
        );

        Ok(())
    }

    /// Hard-deletes a rejected reversal. Every other state refuses.
    pub async fn delete_rejected(&self, actor: &str, reversal_id: &str) -> PosResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let reversal = get_reversal(&mut tx, reversal_id).await?;
        if reversal.state != ReversalState::Rejected {
            return Err(PosError::invalid_state(
                "Only a Rejected Reversal can be Deleted.",
            ));
        }

        sqlx::query("DELETE FROM sales_reversals WHERE id = ?1")
            .bind(reversal_id)
            .execute(&mut *tx)
            .await
            .map_err(step("deleting reversal"))?;

        audit::append_sales_log(
            &mut tx,
            actor,
            &format!("Rejected reversal deleted on {}", reversal.receipt_no),
            0,
        )
        .await
        .map_err(step("logging reversal"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        debug!(reversal_id = %reversal_id, "Rejected reversal deleted");

        Ok(())
    }

    /// Gets one reversal by id.
    pub async fn get(&self, reversal_id: &str) -> PosResult<SalesReversal> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        get_reversal(&mut conn, reversal_id).await
    }

    /// Lists the reversals in one state, oldest first. Feeds the pending
    /// approval queues.
    pub async fn list_by_state(&self, state: ReversalState) -> PosResult<Vec<SalesReversal>> {
        let reversals = sqlx::query_as::<_, SalesReversal>(
            r#"
            SELECT id, receipt_no, product_code, quantity, unit_price_cents,
                   refund_cents, state, tagged_by, authorized_by, rejected_by,
                   posted_by, created_at, updated_at
            FROM sales_reversals
            WHERE state = ?1
            ORDER BY created_at
            "#,
        )
        .bind(state)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(reversals)
    }

    /// One guarded state flip plus its actor stamp and log row.
    async fn transition(
        &self,
        actor: &str,
        reversal_id: &str,
        from: ReversalState,
        to: ReversalState,
        stamp_column: &'static str,
        log_description: &str,
    ) -> PosResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let reversal = get_reversal(&mut tx, reversal_id).await?;
        if reversal.state != from {
            return Err(PosError::invalid_state(format!(
                "Reversal is {:?}, not {:?}.",
                reversal.state, from
            )));
        }

        // stamp_column is one of our own literals, never caller input.
        let sql = format!(
            "UPDATE sales_reversals SET state = ?1, {stamp_column} = ?2, updated_at = ?3 WHERE id = ?4"
        );
        sqlx::query(&sql)
            .bind(to)
            .bind(actor)
            .bind(Utc::now())
            .bind(reversal_id)
            .execute(&mut *tx)
            .await
            .map_err(step("updating reversal state"))?;

        audit::append_sales_log(
            &mut tx,
            actor,
            &format!("{log_description} on {}", reversal.receipt_no),
            reversal.refund_cents,
        )
        .await
        .map_err(step("logging reversal"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        debug!(reversal_id = %reversal_id, from = ?from, to = ?to, "Reversal transitioned");

        Ok(())
    }
}

async fn get_reversal(
    conn: &mut sqlx::SqliteConnection,
    reversal_id: &str,
) -> PosResult<SalesReversal> {
    sqlx::query_as::<_, SalesReversal>(
        r#"
        SELECT id, receipt_no, product_code, quantity, unit_price_cents,
               refund_cents, state, tagged_by, authorized_by, rejected_by,
               posted_by, created_at, updated_at
        FROM sales_reversals
        WHERE id = ?1
        "#,
    )
    .bind(reversal_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DbError::from)?
    .ok_or_else(|| PosError::not_found("Reversal", reversal_id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tillbook_core::{PaymentMethod, Product, SaleLineInput};

    /// Seeds a cashier, a product, and one recorded sale of 2 units at
    /// 25,000 cents; returns the receipt number.
    async fn db_with_sale() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.actors().insert("jane", "JK", None).await.unwrap();

        let now = Utc::now();
        db.products()
            .insert(&Product {
                code: "P001".to_string(),
                name: "Widget".to_string(),
                quantity: 10,
                cost_cents: 15_000,
                wholesale_price_cents: 20_000,
                retail_price_cents: 25_000,
                min_stock_level: 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let receipt_no = db
            .sales()
            .record_sale(
                "jane",
                &[SaleLineInput {
                    product_code: "P001".to_string(),
                    product_name: "Widget".to_string(),
                    quantity: 2,
                    unit_price_cents: 25_000,
                }],
                PaymentMethod::Cash,
                50_000,
            )
            .await
            .unwrap();

        (db, receipt_no)
    }

    /// Posting a reversal that was tagged but never authorized fails
    /// verbatim and leaves the sale, stock and stamps untouched.
    #[tokio::test]
    async fn posting_unauthorized_reversal_rejected_verbatim() {
        let (db, receipt_no) = db_with_sale().await;
        let reversals = db.reversals();

        let id = reversals
            .tag("jane", &receipt_no, "P001", 1, 25_000, 25_000)
            .await
            .unwrap();

        let err = reversals.post("boss", &id).await.unwrap_err();
        assert_eq!(err.to_string(), "Reversal be Tagged/Authorized For Posting.");

        let reversal = reversals.get(&id).await.unwrap();
        assert_eq!(reversal.state, ReversalState::Tagged);
        assert!(reversal.posted_by.is_none());

        // Sale and stock untouched.
        let sale = db.sales().get_sale(&receipt_no).await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 50_000);
        assert_eq!(
            db.products().get_by_code("P001").await.unwrap().unwrap().quantity,
            8
        );
    }

    #[tokio::test]
    async fn full_pipeline_reverses_sale_stock_and_ledger() {
        let (db, receipt_no) = db_with_sale().await;
        let reversals = db.reversals();

        let id = reversals
            .tag("jane", &receipt_no, "P001", 1, 0, 25_000)
            .await
            .unwrap();
        reversals.authorize("boss", &id).await.unwrap();
        reversals.post("boss", &id).await.unwrap();

        let reversal = reversals.get(&id).await.unwrap();
        assert_eq!(reversal.state, ReversalState::Posted);
        assert_eq!(reversal.tagged_by, "jane");
        assert_eq!(reversal.authorized_by.as_deref(), Some("boss"));
        assert_eq!(reversal.posted_by.as_deref(), Some("boss"));

        // One of the two units came back.
        let sale = db.sales().get_sale(&receipt_no).await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 25_000);
        let items = db.sales().get_items(&receipt_no).await.unwrap();
        assert_eq!(items[0].quantity, 1);
        assert_eq!(
            db.products().get_by_code("P001").await.unwrap().unwrap().quantity,
            9
        );

        // The reversal entry sits beside the sale entry, balanced and
        // mirrored: revenue and cash-control on the opposite sides.
        let entries = db.journal().entries_for_reference(&receipt_no).await.unwrap();
        assert_eq!(entries.len(), 2);
        let lines = db.journal().lines_for_entry(&entries[1].id).await.unwrap();
        assert_eq!(lines.len(), 4);
        let debits: i64 = lines.iter().map(|l| l.debit_cents).sum();
        let credits: i64 = lines.iter().map(|l| l.credit_cents).sum();
        assert_eq!(debits, credits);
        let by_account = |name: &str| lines.iter().find(|l| l.account == name).unwrap();
        assert_eq!(by_account(ACCOUNT_SALES_REVENUE).debit_cents, 25_000);
        assert_eq!(by_account(ACCOUNT_SALES_CONTROL).credit_cents, 25_000);
        assert_eq!(by_account(ACCOUNT_INVENTORY).debit_cents, 15_000);
        assert_eq!(by_account(ACCOUNT_COGS).credit_cents, 15_000);
    }

    /// An over-generous reversal floors the sale record at zero instead
    /// of driving it negative.
    #[tokio::test]
    async fn posting_floors_sale_reductions_at_zero() {
        let (db, receipt_no) = db_with_sale().await;
        let reversals = db.reversals();

        let id = reversals
            .tag("jane", &receipt_no, "P001", 5, 30_000, 60_000)
            .await
            .unwrap();
        reversals.authorize("boss", &id).await.unwrap();
        reversals.post("boss", &id).await.unwrap();

        let sale = db.sales().get_sale(&receipt_no).await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 0);
        let items = db.sales().get_items(&receipt_no).await.unwrap();
        assert_eq!(items[0].quantity, 0);
        assert_eq!(items[0].unit_price_cents, 0);

        // Stock still receives the full tagged quantity back.
        assert_eq!(
            db.products().get_by_code("P001").await.unwrap().unwrap().quantity,
            13
        );
    }

    #[tokio::test]
    async fn transitions_move_strictly_forward() {
        let (db, receipt_no) = db_with_sale().await;
        let reversals = db.reversals();

        let id = reversals
            .tag("jane", &receipt_no, "P001", 1, 0, 25_000)
            .await
            .unwrap();
        reversals.authorize("boss", &id).await.unwrap();

        // Authorized is past Tagged: neither authorize nor reject applies.
        assert!(matches!(
            reversals.authorize("boss", &id).await.unwrap_err(),
            PosError::InvalidState(_)
        ));
        assert!(matches!(
            reversals.reject("boss", &id).await.unwrap_err(),
            PosError::InvalidState(_)
        ));

        reversals.post("boss", &id).await.unwrap();

        // Posted is terminal.
        assert!(matches!(
            reversals.post("boss", &id).await.unwrap_err(),
            PosError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn reject_then_delete() {
        let (db, receipt_no) = db_with_sale().await;
        let reversals = db.reversals();

        let id = reversals
            .tag("jane", &receipt_no, "P001", 1, 0, 25_000)
            .await
            .unwrap();

        // Only rejected reversals are deletable.
        assert!(matches!(
            reversals.delete_rejected("boss", &id).await.unwrap_err(),
            PosError::InvalidState(_)
        ));

        reversals.reject("boss", &id).await.unwrap();
        let reversal = reversals.get(&id).await.unwrap();
        assert_eq!(reversal.state, ReversalState::Rejected);
        assert_eq!(reversal.rejected_by.as_deref(), Some("boss"));

        reversals.delete_rejected("boss", &id).await.unwrap();
        assert!(matches!(
            reversals.get(&id).await.unwrap_err(),
            PosError::NotFound { .. }
        ));

        // A rejected (and deleted) reversal never touched the sale.
        let sale = db.sales().get_sale(&receipt_no).await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 50_000);
    }

    #[tokio::test]
    async fn tagging_unknown_sale_item_rejected() {
        let (db, receipt_no) = db_with_sale().await;

        let err = db
            .reversals()
            .tag("jane", &receipt_no, "GHOST", 1, 0, 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::NotFound { .. }));
    }

    #[tokio::test]
    async fn pending_queue_lists_by_state() {
        let (db, receipt_no) = db_with_sale().await;
        let reversals = db.reversals();

        let a = reversals.tag("jane", &receipt_no, "P001", 1, 0, 25_000).await.unwrap();
        let b = reversals.tag("jane", &receipt_no, "P001", 1, 0, 25_000).await.unwrap();
        reversals.authorize("boss", &a).await.unwrap();

        let tagged = reversals.list_by_state(ReversalState::Tagged).await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, b);

        let authorized = reversals.list_by_state(ReversalState::Authorized).await.unwrap();
        assert_eq!(authorized.len(), 1);
        assert_eq!(authorized[0].id, a);
    }
}
