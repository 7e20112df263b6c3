//! Membership repository trait and implementation

use crate::error::Result;
use crate::models::{now_timestamp, Membership, NewMembership};
use crate::repositories::BulkWriteOutcome;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::{debug, warn};

/// Membership repository interface
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert or overwrite each membership by `membership_id`.
    ///
    /// # Errors
    /// Returns `Err` only when no connection to the store can be obtained.
    /// Per-record failures are reported in the outcome.
    async fn upsert_many(&self, memberships: &[NewMembership]) -> Result<BulkWriteOutcome>;

    async fn find_all(&self) -> Result<Vec<Membership>>;

    async fn find_by_id(&self, membership_id: &str) -> Result<Option<Membership>>;

    /// Memberships whose `product_id` equals `product_id`.
    async fn find_by_product(&self, product_id: &str) -> Result<Vec<Membership>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of MembershipRepository
pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn upsert_many(&self, memberships: &[NewMembership]) -> Result<BulkWriteOutcome> {
        let mut conn = self.pool.acquire().await?;
        let mut outcome = BulkWriteOutcome::new();
        let now = now_timestamp();

        for membership in memberships {
            if let Err(message) = membership.validate() {
                warn!(
                    membership_id = %membership.membership_id,
                    error = %message,
                    "Skipping invalid membership"
                );
                outcome.record_failure(&membership.membership_id, message);
                continue;
            }

            let result = query(
                r#"
                INSERT INTO memberships (membership_id, user_id, email, product_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(membership_id) DO UPDATE SET
                    user_id = excluded.user_id,
                    email = excluded.email,
                    product_id = excluded.product_id,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&membership.membership_id)
            .bind(&membership.user_id)
            .bind(&membership.email)
            .bind(&membership.product_id)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await;

            match result {
                Ok(_) => outcome.record_written(),
                Err(e) => {
                    warn!(
                        membership_id = %membership.membership_id,
                        error = %e,
                        "Failed to upsert membership"
                    );
                    outcome.record_failure(&membership.membership_id, e.to_string());
                }
            }
        }

        debug!(
            written = outcome.written,
            failed = outcome.failed(),
            "Membership batch upserted"
        );

        Ok(outcome)
    }

    async fn find_all(&self) -> Result<Vec<Membership>> {
        let memberships =
            query_as::<_, Membership>("SELECT * FROM memberships ORDER BY membership_id ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(memberships)
    }

    async fn find_by_id(&self, membership_id: &str) -> Result<Option<Membership>> {
        let membership =
            query_as::<_, Membership>("SELECT * FROM memberships WHERE membership_id = ?")
                .bind(membership_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(membership)
    }

    async fn find_by_product(&self, product_id: &str) -> Result<Vec<Membership>> {
        let memberships = query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE product_id = ? ORDER BY membership_id ASC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM memberships")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn setup_repo() -> SqliteMembershipRepository {
        SqliteMembershipRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let repo = setup_repo().await;
        let membership = NewMembership::new("mem_1")
            .with_user("user_1")
            .with_email("member@example.com")
            .with_product("prod_1");

        let outcome = repo.upsert_many(&[membership]).await.unwrap();
        assert_eq!(outcome.written, 1);

        let stored = repo.find_by_id("mem_1").await.unwrap().unwrap();
        assert_eq!(stored.user_id.as_deref(), Some("user_1"));
        assert_eq!(stored.email.as_deref(), Some("member@example.com"));
        assert_eq!(stored.product_id.as_deref(), Some("prod_1"));
    }

    #[tokio::test]
    async fn test_later_sighting_overwrites() {
        let repo = setup_repo().await;
        repo.upsert_many(&[NewMembership::new("mem_1").with_product("prod_1")])
            .await
            .unwrap();
        repo.upsert_many(&[NewMembership::new("mem_1")
            .with_product("prod_2")
            .with_user("user_9")])
            .await
            .unwrap();

        let stored = repo.find_by_id("mem_1").await.unwrap().unwrap();
        assert_eq!(stored.product_id.as_deref(), Some("prod_2"));
        assert_eq!(stored.user_id.as_deref(), Some("user_9"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_reference_is_accepted() {
        let repo = setup_repo().await;
        let outcome = repo
            .upsert_many(&[NewMembership::new("mem_1").with_product("not_synced_yet")])
            .await
            .unwrap();
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_partial_batch_failure() {
        let repo = setup_repo().await;
        let batch = vec![
            NewMembership::new("mem_1").with_product("prod_1"),
            NewMembership::new("  "),
            NewMembership::new("mem_3").with_product("prod_1"),
        ];

        let outcome = repo.upsert_many(&batch).await.unwrap();

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_by_product() {
        let repo = setup_repo().await;
        repo.upsert_many(&[
            NewMembership::new("mem_1").with_product("prod_a"),
            NewMembership::new("mem_2").with_product("prod_b"),
            NewMembership::new("mem_3").with_product("prod_a"),
            NewMembership::new("mem_4"),
        ])
        .await
        .unwrap();

        let members = repo.find_by_product("prod_a").await.unwrap();
        let ids: Vec<&str> = members.iter().map(|m| m.membership_id.as_str()).collect();
        assert_eq!(ids, vec!["mem_1", "mem_3"]);

        assert!(repo.find_by_product("prod_z").await.unwrap().is_empty());
        assert_eq!(repo.find_all().await.unwrap().len(), 4);
    }
}
