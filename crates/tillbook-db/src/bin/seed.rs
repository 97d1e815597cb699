//! # Seed Data Generator
//!
//! Populates a development database with actors and products.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p tillbook-db --bin seed
//!
//! # Specify database path
//! cargo run -p tillbook-db --bin seed -- --db ./data/tillbook.db
//! ```
//!
//! Seeds two cashiers (`jane`/JK, `mark`/MX) and a small catalogue with
//! quantity-break pricing, enough to exercise every workflow by hand.

use chrono::Utc;
use std::env;
use tillbook_core::Product;
use tillbook_db::{Database, DbConfig};

/// `(code, name, quantity, cost, wholesale, retail, min_stock)` in cents.
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64, i64)] = &[
    ("P001", "Exercise Book A4", 120, 5_000, 7_000, 9_000, 20),
    ("P002", "Laser Printer", 8, 700_000, 900_000, 1_000_000, 2),
    ("P003", "Ballpoint Pen Blue", 500, 800, 1_200, 2_000, 50),
    ("P004", "Ream Copy Paper", 60, 35_000, 45_000, 55_000, 10),
    ("P005", "Stapler Heavy Duty", 25, 18_000, 24_000, 30_000, 5),
    ("P006", "Whiteboard Marker", 200, 3_000, 4_500, 6_000, 30),
    ("P007", "Desk Calculator", 40, 60_000, 80_000, 95_000, 8),
    ("P008", "Flash Drive 32GB", 75, 45_000, 60_000, 75_000, 10),
];

const ACTORS: &[(&str, &str, &str)] = &[
    ("jane", "JK", "Jane Kamau"),
    ("mark", "MX", "Mark Otieno"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = parse_db_path().unwrap_or_else(|| "tillbook.db".to_string());
    tracing::info!(db_path = %db_path, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    for (username, code, display_name) in ACTORS {
        match db.actors().insert(username, code, Some(display_name)).await {
            Ok(()) => tracing::info!(username, code, "Actor seeded"),
            Err(e) => tracing::warn!(username, error = %e, "Skipping actor"),
        }
    }

    let now = Utc::now();
    let mut inserted = 0usize;
    for &(code, name, quantity, cost, wholesale, retail, min_stock) in PRODUCTS {
        let product = Product {
            code: code.to_string(),
            name: name.to_string(),
            quantity,
            cost_cents: cost,
            wholesale_price_cents: wholesale,
            retail_price_cents: retail,
            min_stock_level: min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        match db.products().insert(&product).await {
            Ok(()) => inserted += 1,
            Err(e) => tracing::warn!(code, error = %e, "Skipping product"),
        }
    }

    tracing::info!(inserted, actors = ACTORS.len(), "Seed complete");

    db.close().await;
    Ok(())
}

/// Reads `--db <path>` from the command line.
fn parse_db_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .cloned()
}
