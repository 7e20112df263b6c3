//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations for the mirrored
//! catalog.
//!
//! ## Architecture
//!
//! - Traits define the interface each consumer depends on
//! - SQLite implementations use sqlx against a shared `SqlitePool`
//! - Bulk writes are per record: one bad record never blocks its siblings,
//!   and the outcome lists what failed
//!
//! ## Available Repositories
//!
//! - `ProductRepository` - products plus the `active_users` counter
//! - `MembershipRepository` - memberships keyed by membership id

pub mod membership;
pub mod outcome;
pub mod product;

pub use membership::{MembershipRepository, SqliteMembershipRepository};
pub use outcome::{BulkWriteOutcome, WriteFailure};
pub use product::{apply_active_user_deltas, ProductRepository, SqliteProductRepository};
