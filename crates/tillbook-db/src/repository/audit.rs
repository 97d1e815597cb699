//! Audit log repository.
//!
//! Three append-only trails, one row per mutating action:
//! order logs, product control logs (stock movements), and sales control
//! logs (sale recording and reversal transitions). Rows are never updated
//! or deleted.
//!
//! Workflow managers append through the connection-scoped functions so
//! the log row commits or rolls back together with the action it
//! describes.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use tillbook_core::{OrderLog, ProductControlLog, SalesControlLog};

// =============================================================================
// Connection-Scoped Appends
// =============================================================================

/// Appends an order log row inside the caller's transaction.
pub async fn append_order_log(
    conn: &mut SqliteConnection,
    order_id: &str,
    actor: &str,
    description: &str,
    amount_cents: i64,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO order_logs (order_id, actor, description, amount_cents, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(order_id)
    .bind(actor)
    .bind(description)
    .bind(amount_cents)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Appends a product control log row inside the caller's transaction.
pub async fn append_product_log(
    conn: &mut SqliteConnection,
    product_code: &str,
    actor: &str,
    description: &str,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO product_control_logs (product_code, actor, description, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(product_code)
    .bind(actor)
    .bind(description)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Appends a sales control log row inside the caller's transaction.
pub async fn append_sales_log(
    conn: &mut SqliteConnection,
    actor: &str,
    description: &str,
    amount_cents: i64,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO sales_control_logs (actor, description, amount_cents, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(actor)
    .bind(description)
    .bind(amount_cents)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Pool-level access to the audit trails: standalone appends (the audit
/// sink contract) and listings for the control-log reports.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Appends a sales control entry outside any workflow transaction.
    pub async fn append_log(&self, actor: &str, description: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        append_sales_log(&mut conn, actor, description, 0).await
    }

    /// Lists the log trail of one order, oldest first.
    pub async fn order_logs(&self, order_id: &str) -> DbResult<Vec<OrderLog>> {
        let logs = sqlx::query_as::<_, OrderLog>(
            r#"
            SELECT id, order_id, actor, description, amount_cents, created_at
            FROM order_logs
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Lists recent stock movements for a product, newest first.
    pub async fn product_logs(&self, product_code: &str, limit: i64) -> DbResult<Vec<ProductControlLog>> {
        let logs = sqlx::query_as::<_, ProductControlLog>(
            r#"
            SELECT id, product_code, actor, description, created_at
            FROM product_control_logs
            WHERE product_code = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Lists recent sales control entries, newest first.
    pub async fn sales_logs(&self, limit: i64) -> DbResult<Vec<SalesControlLog>> {
        let logs = sqlx::query_as::<_, SalesControlLog>(
            r#"
            SELECT id, actor, description, amount_cents, created_at
            FROM sales_control_logs
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn appends_are_listed_in_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = db.audit();

        let mut conn = db.pool().acquire().await.unwrap();
        append_order_log(&mut conn, "o1", "jane", "Order Received", 5_000)
            .await
            .unwrap();
        append_order_log(&mut conn, "o1", "jane", "Item Added", 2_000)
            .await
            .unwrap();
        append_order_log(&mut conn, "o2", "june", "Order Received", 100)
            .await
            .unwrap();
        drop(conn);

        let logs = audit.order_logs("o1").await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].description, "Order Received");
        assert_eq!(logs[1].description, "Item Added");
        assert_eq!(logs[1].amount_cents, 2_000);
    }

    #[tokio::test]
    async fn standalone_append_log() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = db.audit();

        audit.append_log("jane", "End of day count").await.unwrap();

        let logs = audit.sales_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].actor, "jane");
    }
}
