//! # Sync Module
//!
//! Mirrors the remote products and memberships collections into the local
//! store.
//!
//! ## Components
//!
//! - **Page Fetcher** (`fetcher`): Retrieves and normalizes one page of a remote collection
//! - **Cursor Store** (`cursor`): Persists the last ingested memberships page
//! - **Aggregate Maintainer** (`aggregate`): Keeps per-product active user counts current
//! - **Sync Coordinator** (`coordinator`): Runs a products pass followed by a memberships pass
//! - **Scheduler** (`scheduler`): Repeats passes on a fixed interval until cancelled
//! - **Reports** (`report`): Per-pass and per-resource outcomes

pub mod aggregate;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod fetcher;
pub mod report;
pub mod scheduler;

pub use aggregate::{AggregateMaintainer, AggregateOutcome};
pub use coordinator::{SyncConfig, SyncCoordinator};
pub use cursor::{SqliteSyncCursorStore, SyncCursorStore};
pub use error::{Result, SyncError};
pub use fetcher::{
    normalize_membership, normalize_memberships, normalize_product, normalize_products,
    FetchedPage, HttpPageFetcher, PageSource, SyncResource,
};
pub use report::{PassReport, SubPassReport};
pub use scheduler::{SchedulerHandle, SyncScheduler};
