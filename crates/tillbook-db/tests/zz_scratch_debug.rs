use chrono::Utc;
use tillbook_core::{PaymentMethod, Product, SaleLineInput};
use tillbook_db::pool::{Database, DbConfig};

#[tokio::test]
async fn debug_state_roundtrip() {
    tracing_subscriber::fmt()
        .with_env_filter("sqlx=trace")
        .init();
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

    let reversals = db.reversals();
    let id = reversals
        .tag("jane", &receipt_no, "P001", 1, 0, 25_000)
        .await
        .unwrap();
    reversals.authorize("boss", &id).await.unwrap();
    reversals.post("boss", &id).await.unwrap();

    let raw: (String, Option<String>) =
        sqlx::query_as("SELECT state, posted_by FROM sales_reversals WHERE id = ?1")
            .bind(&id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries")
        .fetch_one(db.pool())
        .await
        .unwrap();
    let logs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_control_logs")
        .fetch_one(db.pool())
        .await
        .unwrap();
    let sale_total: i64 =
        sqlx::query_scalar("SELECT total_cents FROM sales WHERE receipt_no = ?1")
            .bind(&receipt_no)
            .fetch_one(db.pool())
            .await
            .unwrap();
    let stock: i64 = sqlx::query_scalar("SELECT quantity FROM products WHERE code = 'P001'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    panic!(
        "after post: state={raw:?} journal_entries={entries} logs={logs} sale_total={sale_total} stock={stock}"
    );
}
