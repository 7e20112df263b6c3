//! Product repository trait and implementation

use crate::error::Result;
use crate::models::{now_timestamp, NewProduct, Product, ProductSummary};
use crate::repositories::BulkWriteOutcome;
use async_trait::async_trait;
use sqlx::{query, query_as, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Product repository interface
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert or update each product by `product_id`.
    ///
    /// Records are validated and written independently. Existing rows get
    /// their `visibility`, `title` and `updated_at` overwritten;
    /// `active_users` is never touched here.
    ///
    /// # Errors
    /// Returns `Err` only when no connection to the store can be obtained.
    /// Per-record failures are reported in the outcome.
    async fn upsert_many(&self, products: &[NewProduct]) -> Result<BulkWriteOutcome>;

    /// Add `delta` to `active_users` for each product in `counts`.
    ///
    /// Runs in one transaction. Unknown product ids are skipped without
    /// creating rows, and the counter never drops below zero. A zero delta
    /// still reports whether the product exists.
    ///
    /// # Returns
    /// The ids whose row exists and was updated.
    async fn increment_active_users(&self, counts: &HashMap<String, i64>)
        -> Result<HashSet<String>>;

    async fn find_all(&self) -> Result<Vec<Product>>;

    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>>;

    async fn count(&self) -> Result<i64>;

    /// Every product with the live number of stored memberships referencing it.
    async fn find_all_with_membership_counts(&self) -> Result<Vec<ProductSummary>>;
}

/// SQLite implementation of ProductRepository
pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn upsert_many(&self, products: &[NewProduct]) -> Result<BulkWriteOutcome> {
        let mut conn = self.pool.acquire().await?;
        let mut outcome = BulkWriteOutcome::new();
        let now = now_timestamp();

        for product in products {
            if let Err(message) = product.validate() {
                warn!(product_id = %product.product_id, error = %message, "Skipping invalid product");
                outcome.record_failure(&product.product_id, message);
                continue;
            }

            let result = query(
                r#"
                INSERT INTO products (product_id, visibility, title, active_users, created_at, updated_at)
                VALUES (?, ?, ?, 0, ?, ?)
                ON CONFLICT(product_id) DO UPDATE SET
                    visibility = excluded.visibility,
                    title = excluded.title,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&product.product_id)
            .bind(&product.visibility)
            .bind(&product.title)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await;

            match result {
                Ok(_) => outcome.record_written(),
                Err(e) => {
                    warn!(product_id = %product.product_id, error = %e, "Failed to upsert product");
                    outcome.record_failure(&product.product_id, e.to_string());
                }
            }
        }

        debug!(
            written = outcome.written,
            failed = outcome.failed(),
            "Product batch upserted"
        );

        Ok(outcome)
    }

    async fn increment_active_users(
        &self,
        counts: &HashMap<String, i64>,
    ) -> Result<HashSet<String>> {
        if counts.is_empty() {
            return Ok(HashSet::new());
        }

        let mut tx = self.pool.begin().await?;
        let incremented = apply_active_user_deltas(&mut tx, counts).await?;
        tx.commit().await?;

        Ok(incremented)
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        let products = query_as::<_, Product>("SELECT * FROM products ORDER BY product_id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>> {
        let product = query_as::<_, Product>("SELECT * FROM products WHERE product_id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }

    async fn find_all_with_membership_counts(&self) -> Result<Vec<ProductSummary>> {
        let summaries = query_as::<_, ProductSummary>(
            r#"
            SELECT
                p.product_id,
                p.visibility,
                p.title,
                p.active_users,
                (SELECT COUNT(*) FROM memberships m WHERE m.product_id = p.product_id)
                    AS membership_count,
                p.created_at,
                p.updated_at
            FROM products p
            ORDER BY p.product_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }
}

/// Add each delta to `active_users` on an open connection.
///
/// Same semantics as [`ProductRepository::increment_active_users`], but the
/// caller owns the transaction so the counter moves together with its own
/// writes.
pub async fn apply_active_user_deltas(
    conn: &mut SqliteConnection,
    counts: &HashMap<String, i64>,
) -> Result<HashSet<String>> {
    let mut incremented = HashSet::new();

    for (product_id, delta) in counts {
        let result = query(
            "UPDATE products SET active_users = MAX(active_users + ?, 0) WHERE product_id = ?",
        )
        .bind(delta)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            incremented.insert(product_id.clone());
        } else {
            debug!(product_id = %product_id, delta, "Increment skipped for unknown product");
        }
    }

    Ok(incremented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn setup_repo() -> SqliteProductRepository {
        SqliteProductRepository::new(create_test_pool().await.unwrap())
    }

    fn counts(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let repo = setup_repo().await;

        let first = NewProduct::new("prod_1")
            .with_title("Starter")
            .with_visibility("visible");
        let outcome = repo.upsert_many(&[first]).await.unwrap();
        assert_eq!(outcome.written, 1);

        let renamed = NewProduct::new("prod_1")
            .with_title("Starter Plus")
            .with_visibility("hidden");
        repo.upsert_many(&[renamed]).await.unwrap();

        let stored = repo.find_by_id("prod_1").await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Starter Plus"));
        assert_eq!(stored.visibility.as_deref(), Some("hidden"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = setup_repo().await;
        let batch = vec![
            NewProduct::new("prod_1").with_title("One"),
            NewProduct::new("prod_2").with_title("Two"),
        ];

        repo.upsert_many(&batch).await.unwrap();
        let before = repo.find_all().await.unwrap();
        repo.upsert_many(&batch).await.unwrap();
        let after = repo.find_all().await.unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 2);
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.product_id, a.product_id);
            assert_eq!(b.title, a.title);
            assert_eq!(b.active_users, a.active_users);
            assert_eq!(b.created_at, a.created_at);
        }
    }

    #[tokio::test]
    async fn test_upsert_isolates_invalid_records() {
        let repo = setup_repo().await;
        let batch = vec![
            NewProduct::new("prod_1"),
            NewProduct::new(""),
            NewProduct::new("prod_3"),
        ];

        let outcome = repo.upsert_many(&batch).await.unwrap();

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.failures[0].key, "");
        assert!(repo.find_by_id("prod_1").await.unwrap().is_some());
        assert!(repo.find_by_id("prod_3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_preserves_active_users() {
        let repo = setup_repo().await;
        repo.upsert_many(&[NewProduct::new("prod_1")]).await.unwrap();
        repo.increment_active_users(&counts(&[("prod_1", 4)]))
            .await
            .unwrap();

        repo.upsert_many(&[NewProduct::new("prod_1").with_title("Renamed")])
            .await
            .unwrap();

        let stored = repo.find_by_id("prod_1").await.unwrap().unwrap();
        assert_eq!(stored.active_users, 4);
    }

    #[tokio::test]
    async fn test_increment_unknown_product_is_noop() {
        let repo = setup_repo().await;
        repo.upsert_many(&[NewProduct::new("prod_1")]).await.unwrap();

        let incremented = repo
            .increment_active_users(&counts(&[("prod_1", 2), ("ghost", 3)]))
            .await
            .unwrap();

        assert!(incremented.contains("prod_1"));
        assert!(!incremented.contains("ghost"));
        assert!(repo.find_by_id("ghost").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(
            repo.find_by_id("prod_1").await.unwrap().unwrap().active_users,
            2
        );
    }

    #[tokio::test]
    async fn test_negative_increment_clamps_at_zero() {
        let repo = setup_repo().await;
        repo.upsert_many(&[NewProduct::new("prod_1")]).await.unwrap();
        repo.increment_active_users(&counts(&[("prod_1", 1)]))
            .await
            .unwrap();

        repo.increment_active_users(&counts(&[("prod_1", -5)]))
            .await
            .unwrap();

        assert_eq!(
            repo.find_by_id("prod_1").await.unwrap().unwrap().active_users,
            0
        );
    }

    #[tokio::test]
    async fn test_membership_counts_in_summary() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProductRepository::new(pool.clone());
        repo.upsert_many(&[NewProduct::new("prod_a"), NewProduct::new("prod_b")])
            .await
            .unwrap();

        for (id, product) in [("m1", "prod_a"), ("m2", "prod_a"), ("m3", "prod_c")] {
            query(
                "INSERT INTO memberships (membership_id, product_id, created_at, updated_at) VALUES (?, ?, 0, 0)",
            )
            .bind(id)
            .bind(product)
            .execute(&pool)
            .await
            .unwrap();
        }

        let summaries = repo.find_all_with_membership_counts().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].product_id, "prod_a");
        assert_eq!(summaries[0].membership_count, 2);
        assert_eq!(summaries[1].membership_count, 0);
    }

    #[tokio::test]
    async fn test_deltas_roll_back_with_caller_transaction() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProductRepository::new(pool.clone());
        repo.upsert_many(&[NewProduct::new("prod_1")]).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let touched = apply_active_user_deltas(&mut tx, &counts(&[("prod_1", 3)]))
            .await
            .unwrap();
        assert!(touched.contains("prod_1"));
        tx.rollback().await.unwrap();

        assert_eq!(
            repo.find_by_id("prod_1").await.unwrap().unwrap().active_users,
            0
        );
    }
}
