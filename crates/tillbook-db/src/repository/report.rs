//! Reporting queries.
//!
//! Read-only aggregations feeding UI tables and charts. This module only
//! materializes rows; rendering, export and printing are external
//! collaborators that receive the finished data and never query.

use sqlx::SqlitePool;

use crate::error::DbResult;
use tillbook_core::OrderStatus;

/// Sales total for one period (a year or a month).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesByPeriodRow {
    /// `YYYY` or `YYYY-MM`.
    pub period: String,
    pub total_cents: i64,
    pub receipts: i64,
}

/// Sales total per cashier.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesByCashierRow {
    pub cashier: String,
    pub total_cents: i64,
    pub receipts: i64,
}

/// One order joined with its settlement state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderHistoryRow {
    pub order_id: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub amount_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for read-only reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Sales totals grouped by year, oldest first.
    pub async fn sales_by_year(&self) -> DbResult<Vec<SalesByPeriodRow>> {
        let rows = sqlx::query_as::<_, SalesByPeriodRow>(
            r#"
            SELECT strftime('%Y', created_at) AS period,
                   COALESCE(SUM(total_cents), 0) AS total_cents,
                   COUNT(*) AS receipts
            FROM sales
            GROUP BY period
            ORDER BY period
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sales totals grouped by month within `year`, January first.
    pub async fn sales_by_month(&self, year: i32) -> DbResult<Vec<SalesByPeriodRow>> {
        let rows = sqlx::query_as::<_, SalesByPeriodRow>(
            r#"
            SELECT strftime('%Y-%m', created_at) AS period,
                   COALESCE(SUM(total_cents), 0) AS total_cents,
                   COUNT(*) AS receipts
            FROM sales
            WHERE strftime('%Y', created_at) = ?1
            GROUP BY period
            ORDER BY period
            "#,
        )
        .bind(format!("{year:04}"))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sales totals grouped by cashier, largest first.
    pub async fn sales_by_cashier(&self) -> DbResult<Vec<SalesByCashierRow>> {
        let rows = sqlx::query_as::<_, SalesByCashierRow>(
            r#"
            SELECT cashier,
                   COALESCE(SUM(total_cents), 0) AS total_cents,
                   COUNT(*) AS receipts
            FROM sales
            GROUP BY cashier
            ORDER BY total_cents DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Order history joined with settlement state, newest first.
    pub async fn order_history(&self) -> DbResult<Vec<OrderHistoryRow>> {
        let rows = sqlx::query_as::<_, OrderHistoryRow>(
            r#"
            SELECT o.order_id,
                   o.customer_name,
                   o.status,
                   o.amount_cents,
                   COALESCE(p.paid_cents, 0) AS paid_cents,
                   COALESCE(p.balance_cents, o.amount_cents) AS balance_cents,
                   o.created_at
            FROM orders o
            LEFT JOIN order_payments p ON p.order_id = o.order_id
            ORDER BY o.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
