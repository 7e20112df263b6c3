//! Pass and sub-pass reports returned by the coordinator

use crate::fetcher::SyncResource;
use chrono::{DateTime, Utc};
use core_library::repositories::{BulkWriteOutcome, WriteFailure};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of paging through one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubPassReport {
    pub resource: SyncResource,
    /// First page requested
    pub start_page: u32,
    pub pages_fetched: u32,
    pub records_seen: u64,
    pub records_written: u64,
    /// Records dropped during normalization
    pub records_skipped: u64,
    pub write_failures: Vec<WriteFailure>,
    /// Last page whose records were written
    pub last_committed_page: Option<u32>,
    /// Total pages as last reported by the server
    pub total_pages: Option<u32>,
    /// Error that ended the sub-pass early
    pub error: Option<String>,
}

impl SubPassReport {
    pub fn new(resource: SyncResource, start_page: u32) -> Self {
        Self {
            resource,
            start_page,
            pages_fetched: 0,
            records_seen: 0,
            records_written: 0,
            records_skipped: 0,
            write_failures: Vec::new(),
            last_committed_page: None,
            total_pages: None,
            error: None,
        }
    }

    /// Fold one page's write outcome into the totals.
    pub fn absorb_page(&mut self, page: u32, seen: usize, skipped: usize, outcome: BulkWriteOutcome) {
        self.records_seen += seen as u64;
        self.records_skipped += skipped as u64;
        self.records_written += outcome.written as u64;
        self.write_failures.extend(outcome.failures);
        self.last_committed_page = Some(page);
    }

    /// Page the sub-pass would continue from.
    pub fn next_page(&self) -> u32 {
        self.last_committed_page
            .map_or(self.start_page, |page| page + 1)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one full pass: products, then memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub products: SubPassReport,
    pub memberships: SubPassReport,
}

impl PassReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn has_errors(&self) -> bool {
        !self.products.is_success() || !self.memberships.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_tracks_commits() {
        let mut report = SubPassReport::new(SyncResource::Memberships, 4);
        assert_eq!(report.next_page(), 4);

        let mut outcome = BulkWriteOutcome::new();
        outcome.record_written();
        outcome.record_failure("mem_x", "bad");
        report.absorb_page(4, 3, 1, outcome);

        assert_eq!(report.next_page(), 5);
        assert_eq!(report.records_seen, 3);
        assert_eq!(report.records_written, 1);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(report.write_failures.len(), 1);
        assert!(report.is_success());
    }

    #[test]
    fn test_pass_report_errors_and_json() {
        let started_at = Utc::now();
        let mut memberships = SubPassReport::new(SyncResource::Memberships, 1);
        memberships.error = Some("HTTP 500".to_string());

        let report = PassReport {
            pass_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at + chrono::Duration::seconds(2),
            products: SubPassReport::new(SyncResource::Products, 1),
            memberships,
        };

        assert!(report.has_errors());
        assert_eq!(report.duration().num_seconds(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["memberships"]["resource"], "memberships");
        assert_eq!(json["memberships"]["error"], "HTTP 500");
    }
}
