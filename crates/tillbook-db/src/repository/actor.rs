//! Actor repository: shop users and actor-code resolution.
//!
//! Every workflow stamps the acting user onto its rows; the short `code`
//! additionally prefixes receipt numbers, so it must stay unique.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tillbook_core::Actor;

/// Repository for actor database operations.
#[derive(Debug, Clone)]
pub struct ActorRepository {
    pool: SqlitePool,
}

impl ActorRepository {
    /// Creates a new ActorRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ActorRepository { pool }
    }

    /// Creates an actor.
    pub async fn insert(
        &self,
        username: &str,
        code: &str,
        display_name: Option<&str>,
    ) -> DbResult<()> {
        debug!(username = %username, code = %code, "Creating actor");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO actors (username, code, display_name, is_active, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            "#,
        )
        .bind(username)
        .bind(code)
        .bind(display_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an actor by username.
    pub async fn get(&self, username: &str) -> DbResult<Option<Actor>> {
        let actor = sqlx::query_as::<_, Actor>(
            r#"
            SELECT username, code, display_name, is_active, created_at
            FROM actors
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(actor)
    }

    /// Resolves a username to its actor code.
    ///
    /// Deactivated actors do not resolve; their historical rows keep the
    /// stamps they already carry.
    pub async fn lookup_actor_code(&self, username: &str) -> DbResult<String> {
        let code: Option<String> =
            sqlx::query_scalar("SELECT code FROM actors WHERE username = ?1 AND is_active = 1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        code.ok_or_else(|| DbError::not_found("User", username))
    }

    /// Deactivates an actor.
    pub async fn deactivate(&self, username: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE actors SET is_active = 0 WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", username));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn lookup_resolves_active_actors_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.actors();

        repo.insert("jane", "JK", Some("Jane K")).await.unwrap();

        assert_eq!(repo.lookup_actor_code("jane").await.unwrap(), "JK");

        let err = repo.lookup_actor_code("nobody").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        repo.deactivate("jane").await.unwrap();
        assert!(repo.lookup_actor_code("jane").await.is_err());

        // The row itself survives deactivation.
        let actor = repo.get("jane").await.unwrap().unwrap();
        assert!(!actor.is_active);
    }

    #[tokio::test]
    async fn duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.actors();

        repo.insert("jane", "JK", None).await.unwrap();
        let err = repo.insert("june", "JK", None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
