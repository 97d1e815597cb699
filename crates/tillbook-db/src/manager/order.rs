//! # Order Manager
//!
//! Customer-order lifecycle: `Pending → Delivered` (terminal), or a
//! pending order is deleted outright.
//!
//! ## Money bookkeeping
//! `orders.amount_cents` is the authoritative running total. Every item
//! add/edit goes through [`adjust_order_amount`], which moves
//! `orders.amount_cents` and `order_payments.total_cents`/`balance_cents`
//! by the same delta inside the caller's transaction, so
//! `Order.amount == OrderPayment.total` and
//! `balance == total - paid` hold after every operation.
//!
//! Quantity edits compute their delta from the item row re-read inside
//! the transaction, never from a caller-supplied snapshot, so a stale UI
//! cannot corrupt the running total.
//!
//! Delivery is the guarded stock path: each decrement is conditional on
//! sufficient stock and any shortfall rolls back the whole delivery,
//! status flip included.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::manager::step;
use crate::repository::{audit, product};
use tillbook_core::validation::{validate_name, validate_order_item};
use tillbook_core::{
    Money, Order, OrderItem, OrderItemInput, OrderPayment, OrderStatus, PosError, PosResult,
};

/// Workflow manager for customer orders.
#[derive(Debug, Clone)]
pub struct OrderManager {
    pool: SqlitePool,
}

impl OrderManager {
    /// Creates a new OrderManager.
    pub fn new(pool: SqlitePool) -> Self {
        OrderManager { pool }
    }

    /// Creates an order with its items and settlement row.
    ///
    /// The settlement row is always created; `deposit_cents` may be zero
    /// when no money is taken up front. Returns the generated order id.
    pub async fn create(
        &self,
        actor: &str,
        customer_name: &str,
        contact: Option<&str>,
        deadline: Option<DateTime<Utc>>,
        items: &[OrderItemInput],
        deposit_cents: i64,
    ) -> PosResult<String> {
        validate_name("customer_name", customer_name)?;
        for item in items {
            validate_order_item(item)?;
        }
        if deposit_cents < 0 {
            return Err(PosError::invalid_amount("Deposit cannot be negative."));
        }

        let total: Money = items.iter().map(OrderItemInput::total_price).sum();
        if deposit_cents > total.cents() {
            return Err(PosError::invalid_amount(
                "Deposit cannot exceed the order amount.",
            ));
        }

        let order_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, customer_name, contact, deadline,
                amount_cents, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&order_id)
        .bind(customer_name)
        .bind(contact)
        .bind(deadline)
        .bind(total.cents())
        .bind(OrderStatus::Pending)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("recording order"))?;

        for item in items {
            insert_item(&mut tx, &order_id, item, now)
                .await
                .map_err(step("recording order items"))?;
        }

        sqlx::query(
            r#"
            INSERT INTO order_payments (order_id, total_cents, paid_cents, balance_cents, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&order_id)
        .bind(total.cents())
        .bind(deposit_cents)
        .bind(total.cents() - deposit_cents)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(step("recording order settlement"))?;

        audit::append_order_log(&mut tx, &order_id, actor, "Order Received", total.cents())
            .await
            .map_err(step("logging order"))?;
        if deposit_cents > 0 {
            audit::append_order_log(&mut tx, &order_id, actor, "Deposit Received", deposit_cents)
                .await
                .map_err(step("logging order"))?;
        }

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(order_id = %order_id, customer = %customer_name, amount = %total, "Order created");

        Ok(order_id)
    }

    /// Adds one item to a pending order and grows the running total.
    pub async fn add_item(&self, actor: &str, order_id: &str, item: &OrderItemInput) -> PosResult<()> {
        validate_order_item(item)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        require_pending(&mut tx, order_id).await?;

        let now = Utc::now();
        insert_item(&mut tx, order_id, item, now)
            .await
            .map_err(step("recording order item"))?;

        let delta = item.total_price().cents();
        adjust_order_amount(&mut tx, order_id, delta, now)
            .await
            .map_err(step("adjusting amount"))?;

        audit::append_order_log(
            &mut tx,
            order_id,
            actor,
            &format!("Item Added: {} x{}", item.product_name, item.quantity),
            delta,
        )
        .await
        .map_err(step("logging order"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        debug!(order_id = %order_id, product = %item.product_code, delta, "Order item added");

        Ok(())
    }

    /// Changes the quantity of an existing order item.
    ///
    /// The amount delta is computed from the item row as it stands inside
    /// this transaction, not from any caller-held copy.
    pub async fn edit_item_quantity(
        &self,
        actor: &str,
        order_id: &str,
        item_id: &str,
        new_quantity: i64,
    ) -> PosResult<()> {
        if new_quantity <= 0 {
            return Err(PosError::invalid_amount("Quantity must be positive."));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        require_pending(&mut tx, order_id).await?;

        let current = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_code, product_name,
                   quantity, unit_price_cents, total_price_cents, created_at
            FROM order_items
            WHERE id = ?1 AND order_id = ?2
            "#,
        )
        .bind(item_id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(step("reading order item"))?
        .ok_or_else(|| PosError::not_found("OrderItem", item_id))?;

        let new_total = Money::from_cents(current.unit_price_cents).multiply_quantity(new_quantity);
        let delta = new_total.cents() - current.total_price_cents;
        let now = Utc::now();

        sqlx::query(
            "UPDATE order_items SET quantity = ?1, total_price_cents = ?2 WHERE id = ?3",
        )
        .bind(new_quantity)
        .bind(new_total.cents())
        .bind(item_id)
        .execute(&mut *tx)
        .await
        .map_err(step("updating order item"))?;

        adjust_order_amount(&mut tx, order_id, delta, now)
            .await
            .map_err(step("adjusting amount"))?;

        audit::append_order_log(
            &mut tx,
            order_id,
            actor,
            &format!(
                "Item Quantity Changed: {} {} -> {}",
                current.product_name, current.quantity, new_quantity
            ),
            delta,
        )
        .await
        .map_err(step("logging order"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        debug!(order_id = %order_id, item_id = %item_id, new_quantity, delta, "Order item edited");

        Ok(())
    }

    /// Receives a payment towards an order.
    ///
    /// Cash and mobile-money amounts are combined into one payment total.
    /// Rejects a fully-settled order, non-positive payments, and payments
    /// exceeding the outstanding balance; no rows change on rejection.
    pub async fn receive_payment(
        &self,
        actor: &str,
        order_id: &str,
        cash_cents: i64,
        mpesa_cents: i64,
    ) -> PosResult<()> {
        if cash_cents < 0 || mpesa_cents < 0 {
            return Err(PosError::invalid_amount("Payment amounts cannot be negative."));
        }
        let payment = cash_cents + mpesa_cents;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let settlement = get_settlement(&mut tx, order_id).await?;

        if settlement.is_fully_paid() {
            return Err(PosError::invalid_amount("This Order is Already Paid Fully."));
        }
        if payment <= 0 {
            return Err(PosError::invalid_amount("Payment must be positive."));
        }
        if payment > settlement.balance_cents {
            return Err(PosError::invalid_amount(format!(
                "Payment {} exceeds the outstanding balance {}.",
                Money::from_cents(payment),
                Money::from_cents(settlement.balance_cents)
            )));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE order_payments
            SET paid_cents = paid_cents + ?1,
                balance_cents = balance_cents - ?1,
                updated_at = ?2
            WHERE order_id = ?3
            "#,
        )
        .bind(payment)
        .bind(now)
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(step("updating settlement"))?;

        let fully_paid = payment == settlement.balance_cents;
        let description = if fully_paid {
            "Order Fully Paid"
        } else {
            "Order Partially Paid"
        };
        audit::append_order_log(&mut tx, order_id, actor, description, payment)
            .await
            .map_err(step("logging order"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(order_id = %order_id, payment, fully_paid, "Order payment received");

        Ok(())
    }

    /// Delivers a pending order: flips the status and issues stock.
    ///
    /// Each item's decrement is conditional on sufficient stock; any
    /// shortfall aborts the whole delivery, leaving the order pending and
    /// stock untouched.
    pub async fn deliver(&self, actor: &str, order_id: &str) -> PosResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let now = Utc::now();
        let flipped = sqlx::query(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE order_id = ?3 AND status = ?4",
        )
        .bind(OrderStatus::Delivered)
        .bind(now)
        .bind(order_id)
        .bind(OrderStatus::Pending)
        .execute(&mut *tx)
        .await
        .map_err(step("updating order status"))?;

        if flipped.rows_affected() == 0 {
            // Either no such order or it is already delivered.
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM orders WHERE order_id = ?1")
                    .bind(order_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(step("reading order"))?;
            return Err(match exists {
                Some(_) => PosError::invalid_state("This Order is Already Delivered."),
                None => PosError::not_found("Order", order_id),
            });
        }

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_code, product_name,
                   quantity, unit_price_cents, total_price_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(step("reading order items"))?;

        for item in &items {
            let decremented =
                product::decrement_stock_guarded(&mut tx, &item.product_code, item.quantity)
                    .await
                    .map_err(step("adjusting stock"))?;
            if !decremented {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT quantity FROM products WHERE code = ?1")
                        .bind(&item.product_code)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(step("reading stock"))?;
                warn!(order_id = %order_id, product = %item.product_code, "Delivery blocked by insufficient stock");
                return Err(PosError::InsufficientStock {
                    code: item.product_code.clone(),
                    available: available.unwrap_or(0),
                    requested: item.quantity,
                });
            }

            audit::append_product_log(
                &mut tx,
                &item.product_code,
                actor,
                &format!("Delivered {} units on order {}", item.quantity, order_id),
            )
            .await
            .map_err(step("logging stock movement"))?;
        }

        audit::append_order_log(&mut tx, order_id, actor, "Order Delivered", 0)
            .await
            .map_err(step("logging order"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(order_id = %order_id, items = items.len(), "Order delivered");

        Ok(())
    }

    /// Deletes an order outright; items and settlement rows cascade.
    ///
    /// Order log rows survive the deletion on purpose: the trail of a
    /// deleted order is still part of the audit record.
    pub async fn delete(&self, actor: &str, order_id: &str) -> PosResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let deleted = sqlx::query("DELETE FROM orders WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(step("deleting order"))?;
        if deleted.rows_affected() == 0 {
            return Err(PosError::not_found("Order", order_id));
        }

        audit::append_order_log(&mut tx, order_id, actor, "Order Deleted", 0)
            .await
            .map_err(step("logging order"))?;

        tx.commit().await.map_err(step("committing transaction"))?;

        info!(order_id = %order_id, "Order deleted");

        Ok(())
    }

    /// Gets an order header.
    pub async fn get_order(&self, order_id: &str) -> PosResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, customer_name, contact, deadline,
                   amount_cents, status, created_at, updated_at
            FROM orders
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(order)
    }

    /// Gets the items on an order.
    pub async fn get_items(&self, order_id: &str) -> PosResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_code, product_name,
                   quantity, unit_price_cents, total_price_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(items)
    }

    /// Gets the settlement row of an order.
    pub async fn get_settlement(&self, order_id: &str) -> PosResult<OrderPayment> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        get_settlement(&mut conn, order_id).await
    }
}

/// Moves the order running total and its settlement row by `delta_cents`,
/// keeping them in lock-step.
async fn adjust_order_amount(
    conn: &mut SqliteConnection,
    order_id: &str,
    delta_cents: i64,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE orders SET amount_cents = amount_cents + ?1, updated_at = ?2 WHERE order_id = ?3")
        .bind(delta_cents)
        .bind(now)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        UPDATE order_payments
        SET total_cents = total_cents + ?1,
            balance_cents = balance_cents + ?1,
            updated_at = ?2
        WHERE order_id = ?3
        "#,
    )
    .bind(delta_cents)
    .bind(now)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_item(
    conn: &mut SqliteConnection,
    order_id: &str,
    item: &OrderItemInput,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_code, product_name,
            quantity, unit_price_cents, total_price_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(order_id)
    .bind(&item.product_code)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.total_price().cents())
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

async fn get_settlement(conn: &mut SqliteConnection, order_id: &str) -> PosResult<OrderPayment> {
    sqlx::query_as::<_, OrderPayment>(
        r#"
        SELECT order_id, total_cents, paid_cents, balance_cents, updated_at
        FROM order_payments
        WHERE order_id = ?1
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DbError::from)?
    .ok_or_else(|| PosError::not_found("Order", order_id))
}

/// Items and payments only attach to orders that are still pending.
async fn require_pending(conn: &mut SqliteConnection, order_id: &str) -> PosResult<()> {
    let status: Option<OrderStatus> =
        sqlx::query_scalar("SELECT status FROM orders WHERE order_id = ?1")
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;

    match status {
        None => Err(PosError::not_found("Order", order_id)),
        Some(OrderStatus::Delivered) => {
            Err(PosError::invalid_state("This Order is Already Delivered."))
        }
        Some(OrderStatus::Pending) => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
