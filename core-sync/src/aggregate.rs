//! # Aggregate Maintainer
//!
//! Keeps `products.active_users` in step with ingested memberships using
//! relative increments, so a pass never has to recount the whole table.
//!
//! ## Idempotency
//!
//! The `counted_memberships` ledger remembers which product each membership
//! was counted toward:
//!
//! | Ledger entry | Page says | Effect |
//! |---|---|---|
//! | none | product P | P + 1, ledger ← P |
//! | P | product P | nothing |
//! | X | product P | X − 1, P + 1, ledger ← P |
//! | any | no product | nothing |
//!
//! A membership whose product is not stored yet is left out of the ledger
//! so a later sighting counts it once the product exists. When it was
//! previously counted elsewhere, its old entry is removed along with the
//! decrement.
//!
//! Ledger reads, counter updates and ledger writes for a page share one
//! transaction: either all of them land or none do.

use crate::{Result, SyncError};
use core_library::models::{now_timestamp, NewMembership};
use core_library::repositories::apply_active_user_deltas;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ids per ledger lookup, well under SQLite's bound-parameter limit
const LEDGER_LOOKUP_CHUNK: usize = 500;

/// What applying one page did to the counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOutcome {
    /// Net delta per product that exists locally
    pub applied: HashMap<String, i64>,
    /// Memberships counted for the first time
    pub newly_counted: usize,
    /// Memberships moved from one product to another
    pub moved: usize,
    /// Memberships already counted toward the same product
    pub already_counted: usize,
    /// Memberships without a product reference
    pub without_product: usize,
    /// Memberships whose product is not stored yet
    pub pending_product: usize,
}

enum Transition {
    New { product_id: String },
    Moved { from: String, to: String },
}

fn db_error(e: sqlx::Error) -> SyncError {
    SyncError::Database(e.to_string())
}

/// Applies membership pages to the `active_users` counters.
pub struct AggregateMaintainer {
    pool: SqlitePool,
}

impl AggregateMaintainer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count one page of memberships toward their products.
    ///
    /// The same page may be applied any number of times; only the first
    /// successful application changes the counters. A failed application
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// Returns a database error if the ledger or the counters cannot be
    /// read or written. The page's transaction is rolled back in that case.
    pub async fn apply_page(&self, memberships: &[NewMembership]) -> Result<AggregateOutcome> {
        let mut outcome = AggregateOutcome::default();

        // Last sighting of a membership within the page wins
        let mut latest: HashMap<&str, Option<&str>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for membership in memberships {
            let id = membership.membership_id.as_str();
            if latest
                .insert(id, membership.product_id.as_deref())
                .is_none()
            {
                order.push(id);
            }
        }

        let referenced: Vec<&str> = order
            .iter()
            .copied()
            .filter(|id| latest.get(id).copied().flatten().is_some())
            .collect();
        outcome.without_product = order.len() - referenced.len();
        if referenced.is_empty() {
            return Ok(outcome);
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let counted = counted_products(&mut tx, &referenced).await?;

        let mut transitions = Vec::new();
        let mut deltas: HashMap<String, i64> = HashMap::new();

        for membership_id in referenced {
            let Some(product_id) = latest.get(membership_id).copied().flatten() else {
                continue;
            };

            match counted.get(membership_id) {
                Some(previous) if previous == product_id => outcome.already_counted += 1,
                Some(previous) => {
                    *deltas.entry(previous.clone()).or_insert(0) -= 1;
                    *deltas.entry(product_id.to_string()).or_insert(0) += 1;
                    transitions.push((
                        membership_id,
                        Transition::Moved {
                            from: previous.clone(),
                            to: product_id.to_string(),
                        },
                    ));
                }
                None => {
                    *deltas.entry(product_id.to_string()).or_insert(0) += 1;
                    transitions.push((
                        membership_id,
                        Transition::New {
                            product_id: product_id.to_string(),
                        },
                    ));
                }
            }
        }

        if transitions.is_empty() {
            return Ok(outcome);
        }

        let existing = apply_active_user_deltas(&mut tx, &deltas).await?;
        record_transitions(&mut tx, &transitions, &existing, &mut outcome).await?;
        tx.commit().await.map_err(db_error)?;

        outcome.applied = deltas
            .into_iter()
            .filter(|(product_id, _)| existing.contains(product_id))
            .collect();

        debug!(
            newly_counted = outcome.newly_counted,
            moved = outcome.moved,
            already_counted = outcome.already_counted,
            pending_product = outcome.pending_product,
            "Aggregate page applied"
        );

        Ok(outcome)
    }
}

/// Ledger entries for `membership_ids`, keyed by membership id.
async fn counted_products(
    conn: &mut SqliteConnection,
    membership_ids: &[&str],
) -> Result<HashMap<String, String>> {
    let mut counted = HashMap::with_capacity(membership_ids.len());

    for chunk in membership_ids.chunks(LEDGER_LOOKUP_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT membership_id, product_id FROM counted_memberships WHERE membership_id IN (",
        );
        let mut ids = builder.separated(", ");
        for id in chunk {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        let rows: Vec<(String, String)> = builder
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
        counted.extend(rows);
    }

    Ok(counted)
}

async fn record_transitions(
    conn: &mut SqliteConnection,
    transitions: &[(&str, Transition)],
    existing: &HashSet<String>,
    outcome: &mut AggregateOutcome,
) -> Result<()> {
    let now = now_timestamp();

    for &(membership_id, ref transition) in transitions {
        let (target, was_counted) = match transition {
            Transition::New { product_id } => (product_id, false),
            Transition::Moved { from, to } => {
                debug!(membership_id, from = %from, to = %to, "Membership changed product");
                (to, true)
            }
        };

        if existing.contains(target) {
            sqlx::query(
                r#"
                INSERT INTO counted_memberships (membership_id, product_id, counted_at)
                VALUES (?, ?, ?)
                ON CONFLICT(membership_id) DO UPDATE SET
                    product_id = excluded.product_id,
                    counted_at = excluded.counted_at
                "#,
            )
            .bind(membership_id)
            .bind(target)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

            if was_counted {
                outcome.moved += 1;
            } else {
                outcome.newly_counted += 1;
            }
        } else {
            if was_counted {
                sqlx::query("DELETE FROM counted_memberships WHERE membership_id = ?")
                    .bind(membership_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(db_error)?;
            }
            outcome.pending_product += 1;
        }
    }

    Ok(())
}
