//! # Journal Recorder
//!
//! Generic double-entry journal posting. Given account metadata and a set
//! of debit/credit lines, persists one balanced journal entry tied to a
//! reference string (receipt number, order id, treasury reference).
//!
//! ## Rules
//! - Accounts named by lines are provisioned idempotently from the
//!   supplied metadata; a line naming an account that neither exists nor
//!   has metadata fails the whole posting.
//! - `Σdebit == Σcredit` is enforced before any row is written. Callers
//!   are expected to construct balanced line sets, but the recorder does
//!   not trust them.
//! - Composable: [`post_entry`] runs on the caller's connection so a
//!   workflow can put its journal entry inside its own transaction.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::manager::step;
use tillbook_core::types::lines_are_balanced;
use tillbook_core::{
    AccountSpec, JournalEntry, JournalLine, JournalLineInput, Money, PosError, PosResult,
    ValidationError,
};

/// Posts one journal entry on the caller's connection.
///
/// Returns the generated entry id. Used by the workflow managers inside
/// their transactions; standalone callers should go through
/// [`JournalRecorder::record_transaction`].
pub async fn post_entry(
    conn: &mut SqliteConnection,
    accounts: &[AccountSpec],
    lines: &[JournalLineInput],
    reference: &str,
    description: &str,
) -> PosResult<String> {
    if lines.is_empty() {
        return Err(ValidationError::Empty {
            context: "journal entry".to_string(),
        }
        .into());
    }

    if !lines_are_balanced(lines) {
        let debits: Money = lines.iter().map(|l| l.debit).sum();
        let credits: Money = lines.iter().map(|l| l.credit).sum();
        return Err(ValidationError::UnbalancedEntry {
            reference: reference.to_string(),
            debits: debits.cents(),
            credits: credits.cents(),
        }
        .into());
    }

    provision_accounts(conn, accounts, lines).await?;

    let entry_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO journal_entries (id, reference, description, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&entry_id)
    .bind(reference)
    .bind(description)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(step("posting journal entry"))?;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO journal_lines (id, entry_id, account, debit_cents, credit_cents, description)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry_id)
        .bind(&line.account)
        .bind(line.debit.cents())
        .bind(line.credit.cents())
        .bind(&line.description)
        .execute(&mut *conn)
        .await
        .map_err(step("posting journal line"))?;
    }

    debug!(reference = %reference, entry_id = %entry_id, lines = lines.len(), "Journal entry posted");

    Ok(entry_id)
}

/// Ensures every account named by `lines` exists, creating missing ones
/// from `accounts` metadata.
async fn provision_accounts(
    conn: &mut SqliteConnection,
    accounts: &[AccountSpec],
    lines: &[JournalLineInput],
) -> PosResult<()> {
    let now = chrono::Utc::now();

    for line in lines {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE name = ?1")
            .bind(&line.account)
            .fetch_optional(&mut *conn)
            .await
            .map_err(step("resolving ledger account"))?;

        if exists.is_some() {
            continue;
        }

        let spec = accounts
            .iter()
            .find(|a| a.name == line.account)
            .ok_or_else(|| {
                PosError::from(ValidationError::UnknownAccount {
                    account: line.account.clone(),
                })
            })?;

        // OR IGNORE: a line set may name the same missing account twice.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO accounts (name, account_type, description, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&spec.name)
        .bind(spec.account_type)
        .bind(&spec.description)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(step("provisioning ledger account"))?;
    }

    Ok(())
}

/// Pool-level recorder for standalone journal postings.
#[derive(Debug, Clone)]
pub struct JournalRecorder {
    pool: SqlitePool,
}

impl JournalRecorder {
    /// Creates a new JournalRecorder.
    pub fn new(pool: SqlitePool) -> Self {
        JournalRecorder { pool }
    }

    /// Persists one balanced journal entry in its own transaction.
    ///
    /// Failure leaves no partial rows.
    pub async fn record_transaction(
        &self,
        accounts: &[AccountSpec],
        lines: &[JournalLineInput],
        reference: &str,
        description: &str,
    ) -> PosResult<String> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(step("opening transaction"))?;

        let entry_id = post_entry(&mut tx, accounts, lines, reference, description).await?;

        tx.commit().await.map_err(step("committing transaction"))?;
        Ok(entry_id)
    }

    /// Fetches the entries recorded under a reference, oldest first.
    pub async fn entries_for_reference(&self, reference: &str) -> PosResult<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, reference, description, created_at
            FROM journal_entries
            WHERE reference = ?1
            ORDER BY created_at
            "#,
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(entries)
    }

    /// Fetches the lines of one entry.
    pub async fn lines_for_entry(&self, entry_id: &str) -> PosResult<Vec<JournalLine>> {
        let lines = sqlx::query_as::<_, JournalLine>(
            r#"
            SELECT id, entry_id, account, debit_cents, credit_cents, description
            FROM journal_lines
            WHERE entry_id = ?1
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(lines)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
