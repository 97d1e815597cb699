//! # Product Repository
//!
//! Product maintenance and stock movements.
//!
//! ## Stock Movement Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two decrement paths exist, deliberately asymmetric:                    │
//! │                                                                         │
//! │  decrement_stock_guarded                                               │
//! │    UPDATE ... SET quantity = quantity - N                              │
//! │    WHERE code = ? AND quantity >= N                                    │
//! │    Zero affected rows ⇒ insufficient stock, caller rolls back.         │
//! │    Used by order delivery.                                             │
//! │                                                                         │
//! │  decrement_stock_unguarded                                             │
//! │    UPDATE ... SET quantity = quantity - N WHERE code = ?               │
//! │    No sufficiency check; can drive quantity negative.                  │
//! │    Used by direct sale recording - matches the shop's long-standing    │
//! │    behavior of never blocking a counter sale. Unifying the two paths   │
//! │    is a product decision, not a code cleanup.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sufficiency is detected via the affected-row count of the conditional
//! update, never a read-then-write pre-check; that keeps two terminals on
//! the same database from overselling a row between check and update.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::audit;
use tillbook_core::{Money, Product};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT code, name, quantity, cost_cents, wholesale_price_cents,
                   retail_price_cents, min_stock_level, is_active,
                   created_at, updated_at
            FROM products
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(code = %product.code, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                code, name, quantity, cost_cents, wholesale_price_cents,
                retail_price_cents, min_stock_level, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.quantity)
        .bind(product.cost_cents)
        .bind(product.wholesale_price_cents)
        .bind(product.retail_price_cents)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates name, cost and prices of an existing product.
    pub async fn update_details(
        &self,
        code: &str,
        name: &str,
        cost_cents: i64,
        wholesale_price_cents: i64,
        retail_price_cents: i64,
        min_stock_level: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                cost_cents = ?3,
                wholesale_price_cents = ?4,
                retail_price_cents = ?5,
                min_stock_level = ?6,
                updated_at = ?7
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(cost_cents)
        .bind(wholesale_price_cents)
        .bind(retail_price_cents)
        .bind(min_stock_level)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", code));
        }

        Ok(())
    }

    /// Deactivates a product. Products are never deleted; history keeps
    /// referring to them.
    pub async fn deactivate(&self, code: &str) -> DbResult<()> {
        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE code = ?1")
                .bind(code)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", code));
        }

        Ok(())
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT code, name, quantity, cost_cents, wholesale_price_cents,
                   retail_price_cents, min_stock_level, is_active,
                   created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products at or below their reorder threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT code, name, quantity, cost_cents, wholesale_price_cents,
                   retail_price_cents, min_stock_level, is_active,
                   created_at, updated_at
            FROM products
            WHERE is_active = 1 AND quantity <= min_stock_level
            ORDER BY quantity ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Adds `quantity` units back to stock and logs the movement, as one
    /// transaction.
    pub async fn restock(&self, code: &str, quantity: i64, actor: &str) -> DbResult<()> {
        debug!(code = %code, quantity = %quantity, actor = %actor, "Restocking product");

        let mut tx = self.pool.begin().await?;

        let applied = increment_stock(&mut tx, code, quantity).await?;
        if !applied {
            return Err(DbError::not_found("Product", code));
        }

        audit::append_product_log(
            &mut tx,
            code,
            actor,
            &format!("Restocked {quantity} units"),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Connection-Scoped Stock Movements
// =============================================================================
// Called by the workflow managers inside their transactions.

/// Decrements stock only if at least `quantity` units are available.
///
/// Returns `false` (zero affected rows) when stock is insufficient or the
/// product does not exist; the caller decides whether to roll back.
pub async fn decrement_stock_guarded(
    conn: &mut SqliteConnection,
    code: &str,
    quantity: i64,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity - ?2, updated_at = ?3
        WHERE code = ?1 AND quantity >= ?2
        "#,
    )
    .bind(code)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Decrements stock with no sufficiency check.
///
/// Zero affected rows still means the product row itself is missing.
pub async fn decrement_stock_unguarded(
    conn: &mut SqliteConnection,
    code: &str,
    quantity: i64,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity - ?2, updated_at = ?3
        WHERE code = ?1
        "#,
    )
    .bind(code)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Adds units back to stock (reversal posting, restock).
pub async fn increment_stock(
    conn: &mut SqliteConnection,
    code: &str,
    quantity: i64,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity + ?2, updated_at = ?3
        WHERE code = ?1
        "#,
    )
    .bind(code)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetches the unit cost for a product, or NotFound.
pub async fn unit_cost_cents(conn: &mut SqliteConnection, code: &str) -> DbResult<i64> {
    let cost: Option<i64> = sqlx::query_scalar("SELECT cost_cents FROM products WHERE code = ?1")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    cost.ok_or_else(|| DbError::not_found("Product", code))
}

/// Stock-cost lookup: total inventory cost of a set of (code, quantity)
/// line items. The cost basis for COGS postings.
pub async fn total_cost(
    conn: &mut SqliteConnection,
    items: &[(String, i64)],
) -> DbResult<Money> {
    let mut total = Money::zero();
    for (code, quantity) in items {
        let unit = unit_cost_cents(&mut *conn, code).await?;
        total += Money::from_cents(unit).multiply_quantity(*quantity);
    }
    Ok(total)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn widget(code: &str, quantity: i64) -> Product {
        let now = Utc::now();
        Product {
            code: code.to_string(),
            name: format!("Widget {code}"),
            quantity,
            cost_cents: 15_000,
            wholesale_price_cents: 20_000,
            retail_price_cents: 25_000,
            min_stock_level: 2,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("P001", 10)).await.unwrap();

        let found = repo.get_by_code("P001").await.unwrap().unwrap();
        assert_eq!(found.name, "Widget P001");
        assert_eq!(found.quantity, 10);
        assert!(found.is_active);

        assert!(repo.get_by_code("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn guarded_decrement_respects_available_stock() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("P001", 3)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();

        // More than available: refused, stock unchanged.
        assert!(!decrement_stock_guarded(&mut conn, "P001", 5).await.unwrap());
        drop(conn);
        assert_eq!(repo.get_by_code("P001").await.unwrap().unwrap().quantity, 3);

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(decrement_stock_guarded(&mut conn, "P001", 3).await.unwrap());
        drop(conn);
        assert_eq!(repo.get_by_code("P001").await.unwrap().unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn unguarded_decrement_can_go_negative() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("P001", 1)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(decrement_stock_unguarded(&mut conn, "P001", 4).await.unwrap());
        drop(conn);

        assert_eq!(
            repo.get_by_code("P001").await.unwrap().unwrap().quantity,
            -3
        );
    }

    #[tokio::test]
    async fn cost_lookup_sums_line_items() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("P001", 10)).await.unwrap();

        let mut p2 = widget("P002", 10);
        p2.cost_cents = 700_000;
        repo.insert(&p2).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let cost = total_cost(
            &mut conn,
            &[("P001".to_string(), 2), ("P002".to_string(), 1)],
        )
        .await
        .unwrap();
        assert_eq!(cost.cents(), 2 * 15_000 + 700_000);

        let err = total_cost(&mut conn, &[("GHOST".to_string(), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn restock_increments_and_logs() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("P001", 1)).await.unwrap();

        repo.restock("P001", 9, "jane").await.unwrap();
        assert_eq!(
            repo.get_by_code("P001").await.unwrap().unwrap().quantity,
            10
        );

        let logs = db.audit().product_logs("P001", 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].description.contains("Restocked 9"));
    }

    #[tokio::test]
    async fn low_stock_listing() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("LOW", 1)).await.unwrap();
        repo.insert(&widget("OK", 50)).await.unwrap();

        let low = repo.list_low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].code, "LOW");
    }

    #[tokio::test]
    async fn deactivate_soft_deletes() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert(&widget("P001", 5)).await.unwrap();

        repo.deactivate("P001").await.unwrap();
        let p = repo.get_by_code("P001").await.unwrap().unwrap();
        assert!(!p.is_active);
        assert!(repo.list_active().await.unwrap().is_empty());

        let err = repo.deactivate("GHOST").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
