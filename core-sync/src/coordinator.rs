//! # Sync Coordinator
//!
//! Runs one synchronization pass: a full refresh of products followed by an
//! incremental, cursor-driven walk over memberships.
//!
//! ## Workflow
//!
//! ### Products (full refresh)
//! 1. Fetch pages `1..=total`, learning `total` from each response
//! 2. Normalize and upsert every page
//! 3. Pace between pages
//!
//! ### Memberships (incremental)
//! 1. Resume at `cursor + 1` (or page 1 when no cursor exists)
//! 2. Normalize and upsert each page
//! 3. Count written memberships toward their products
//! 4. Advance the cursor to the page just written
//! 5. Stop once the page runs past the reported total. On the very first
//!    run the cursor is then reset to 0
//!
//! A failing sub-pass is recorded in the [`PassReport`] and does not stop
//! the next one. Cancellation stops the whole pass and is returned as
//! [`SyncError::Cancelled`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(coordinator: SyncCoordinator) -> core_sync::Result<()> {
//! let token = CancellationToken::new();
//! let report = coordinator.run_pass(&token).await?;
//! println!("memberships written: {}", report.memberships.records_written);
//! # Ok(())
//! # }
//! ```

use crate::{
    aggregate::AggregateMaintainer,
    cursor::SyncCursorStore,
    fetcher::{normalize_memberships, normalize_products, PageSource, SyncResource},
    report::{PassReport, SubPassReport},
    Result, SyncError,
};
use chrono::Utc;
use core_library::models::NewMembership;
use core_library::repositories::{BulkWriteOutcome, MembershipRepository, ProductRepository};
use core_runtime::config::{SyncEngineConfig, DEFAULT_PAGE_DELAY_MS};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Sync coordinator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause between consecutive page requests of one sub-pass
    pub page_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }
}

impl From<&SyncEngineConfig> for SyncConfig {
    fn from(config: &SyncEngineConfig) -> Self {
        Self {
            page_delay: config.page_delay,
        }
    }
}

/// Per-page figures reported once a page is durably written
struct PageProgress {
    page: u32,
    total_pages: u32,
    seen: usize,
    skipped: usize,
}

/// Sync coordinator for orchestrating synchronization passes
pub struct SyncCoordinator {
    config: SyncConfig,

    /// Remote page source
    source: Arc<dyn PageSource>,

    products: Arc<dyn ProductRepository>,

    memberships: Arc<dyn MembershipRepository>,

    cursors: Arc<dyn SyncCursorStore>,

    /// Keeps `active_users` in step with ingested memberships
    aggregate: AggregateMaintainer,

    /// Event bus for emitting pass progress
    event_bus: EventBus,

    /// Held for the duration of a pass
    pass_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn PageSource>,
        products: Arc<dyn ProductRepository>,
        memberships: Arc<dyn MembershipRepository>,
        cursors: Arc<dyn SyncCursorStore>,
        aggregate: AggregateMaintainer,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            source,
            products,
            memberships,
            cursors,
            aggregate,
            event_bus,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one pass over products, then memberships.
    ///
    /// # Errors
    ///
    /// - `SyncError::PassInProgress` if another pass holds the coordinator
    /// - `SyncError::Cancelled` if `cancel` fires before the pass finishes
    ///
    /// Fetch and database failures inside a sub-pass are not returned; they
    /// are recorded in the corresponding [`SubPassReport::error`].
    #[instrument(skip(self, cancel))]
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let _guard = self
            .pass_lock
            .try_lock()
            .map_err(|_| SyncError::PassInProgress)?;

        let pass_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(%pass_id, "Sync pass started");
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::PassStarted {
                pass_id: pass_id.to_string(),
                started_at: started_at.timestamp(),
            }))
            .ok();

        let mut products = SubPassReport::new(SyncResource::Products, 1);
        let result = self.sync_products(pass_id, cancel, &mut products).await;
        self.settle_sub_pass(pass_id, &mut products, result)?;

        let mut memberships = SubPassReport::new(SyncResource::Memberships, 1);
        let result = self.sync_memberships(pass_id, cancel, &mut memberships).await;
        self.settle_sub_pass(pass_id, &mut memberships, result)?;

        let report = PassReport {
            pass_id,
            started_at,
            finished_at: Utc::now(),
            products,
            memberships,
        };
        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            %pass_id,
            product_pages = report.products.pages_fetched,
            membership_pages = report.memberships.pages_fetched,
            duration_ms,
            has_errors = report.has_errors(),
            "Sync pass completed"
        );
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::PassCompleted {
                pass_id: pass_id.to_string(),
                product_pages: report.products.pages_fetched,
                membership_pages: report.memberships.pages_fetched,
                duration_ms,
            }))
            .ok();

        Ok(report)
    }

    /// Full refresh: pages `1..=total`, no cursor.
    async fn sync_products(
        &self,
        pass_id: Uuid,
        cancel: &CancellationToken,
        report: &mut SubPassReport,
    ) -> Result<()> {
        let resource = SyncResource::Products;
        let mut page = 1;
        let mut total = 1;

        while page <= total {
            check_cancelled(cancel)?;
            let fetched = self.source.fetch_page(resource, page).await?;
            total = fetched.total_pages;
            report.pages_fetched += 1;
            report.total_pages = Some(total);

            let (products, skipped) = normalize_products(&fetched.items, page);

            check_cancelled(cancel)?;
            let outcome = self.products.upsert_many(&products).await?;

            self.record_page(
                pass_id,
                report,
                PageProgress {
                    page,
                    total_pages: total,
                    seen: fetched.items.len(),
                    skipped,
                },
                outcome,
            );

            if page < total {
                self.pace(cancel).await?;
            }
            page += 1;
        }

        Ok(())
    }

    /// Incremental walk resuming after the stored cursor.
    async fn sync_memberships(
        &self,
        pass_id: Uuid,
        cancel: &CancellationToken,
        report: &mut SubPassReport,
    ) -> Result<()> {
        let resource = SyncResource::Memberships;
        let key = resource.cursor_key();

        let prior = self.cursors.get_cursor(key).await?;
        let mut page = prior.map_or(1, |cursor| cursor + 1);
        let mut total: Option<u32> = None;
        report.start_page = page;

        debug!(%pass_id, cursor = ?prior, start_page = page, "Resuming memberships");

        loop {
            if let Some(total) = total {
                if page > total {
                    if prior.is_none() {
                        self.cursors.reset_cursor(key).await?;
                        info!(%pass_id, total_pages = total, "First memberships walk finished, cursor reset");
                    }
                    break;
                }
            }

            check_cancelled(cancel)?;
            let fetched = self.source.fetch_page(resource, page).await?;
            let page_total = fetched.total_pages;
            total = Some(page_total);
            report.pages_fetched += 1;
            report.total_pages = total;

            if page > page_total {
                debug!(%pass_id, page, total_pages = page_total, "Cursor already past the last page");
                continue;
            }

            let (memberships, skipped) = normalize_memberships(&fetched.items, page);

            check_cancelled(cancel)?;
            let outcome = self.memberships.upsert_many(&memberships).await?;

            let failed: HashSet<String> =
                outcome.failures.iter().map(|f| f.key.clone()).collect();
            let written: Vec<NewMembership> = memberships
                .into_iter()
                .filter(|m| !failed.contains(&m.membership_id))
                .collect();

            let counted = self.aggregate.apply_page(&written).await?;
            debug!(
                %pass_id,
                page,
                products_touched = counted.applied.len(),
                newly_counted = counted.newly_counted,
                moved = counted.moved,
                "Active user counts updated"
            );

            self.cursors.advance_cursor(key, page).await?;

            self.record_page(
                pass_id,
                report,
                PageProgress {
                    page,
                    total_pages: page_total,
                    seen: fetched.items.len(),
                    skipped,
                },
                outcome,
            );

            if page < page_total {
                self.pace(cancel).await?;
            }
            page += 1;
        }

        Ok(())
    }

    fn record_page(
        &self,
        pass_id: Uuid,
        report: &mut SubPassReport,
        progress: PageProgress,
        outcome: BulkWriteOutcome,
    ) {
        let resource = report.resource;
        let written = outcome.written as u64;

        if !outcome.is_complete() {
            warn!(
                %pass_id,
                resource = %resource,
                page = progress.page,
                failed = outcome.failed(),
                "Some records on this page were not written"
            );
        }

        report.absorb_page(progress.page, progress.seen, progress.skipped, outcome);

        debug!(
            %pass_id,
            resource = %resource,
            page = progress.page,
            total_pages = progress.total_pages,
            written,
            skipped = progress.skipped,
            "Page processed"
        );
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::PageProcessed {
                pass_id: pass_id.to_string(),
                resource: resource.to_string(),
                page: progress.page,
                total_pages: progress.total_pages,
                records_written: written,
                records_skipped: progress.skipped as u64,
            }))
            .ok();
    }

    /// Route a sub-pass result: cancellation ends the pass, anything else is
    /// recorded on the report.
    fn settle_sub_pass(
        &self,
        pass_id: Uuid,
        report: &mut SubPassReport,
        result: Result<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(SyncError::Cancelled) => {
                warn!(%pass_id, resource = %report.resource, "Sync pass cancelled");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::PassCancelled {
                        pass_id: pass_id.to_string(),
                    }))
                    .ok();
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                let page = report.next_page();
                error!(
                    %pass_id,
                    resource = %report.resource,
                    page,
                    error = %e,
                    "Sub-pass failed"
                );
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::SubPassFailed {
                        pass_id: pass_id.to_string(),
                        resource: report.resource.to_string(),
                        page,
                        message: e.to_string(),
                    }))
                    .ok();
                report.error = Some(e.to_string());
                Ok(())
            }
        }
    }

    async fn pace(&self, cancel: &CancellationToken) -> Result<()> {
        if self.config.page_delay.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            _ = tokio::time::sleep(self.config.page_delay) => Ok(()),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}
