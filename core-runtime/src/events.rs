//! # Event Bus System
//!
//! Broadcasts sync engine progress using `tokio::sync::broadcast`, so hosts
//! (the daemon, a dashboard, tests) can observe passes without coupling to
//! the orchestrator.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wrapping per-domain enums
//! - **EventBus**: cloneable broadcast sender
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ SyncCoordinator  ├────────>│ EventBus  ├────────────>│ Subscriber │
//! └──────────────────┘         │ (broadcast│             └────────────┘
//! ┌──────────────────┐  emit   │  channel) │  subscribe  ┌────────────┐
//! │ Bulk notify      ├────────>│           ├────────────>│ Subscriber │
//! └──────────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::PassCancelled {
//!     pass_id: "pass-1".to_string(),
//! }))
//! .ok();
//!
//! let event = sub.recv().await.unwrap();
//! assert_eq!(event.description(), "Sync pass cancelled");
//! # }
//! ```
//!
//! Emitting with no subscribers returns an error; publishers in this
//! workspace ignore it with `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::SendError, Receiver};

pub use tokio::sync::broadcast::error::RecvError;

/// Default buffer size for the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Root event type published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "payload")]
pub enum CoreEvent {
    /// Sync pass lifecycle and page progress
    Sync(SyncEvent),
    /// Bulk notification fan-out results
    Notification(NotificationEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Notification(e) => e.description(),
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the sync coordinator during a pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A pass acquired the overlap guard and is starting.
    PassStarted {
        pass_id: String,
        /// Unix epoch seconds
        started_at: i64,
    },
    /// One page was fetched and durably written.
    PageProcessed {
        pass_id: String,
        /// `"products"` or `"memberships"`
        resource: String,
        page: u32,
        total_pages: u32,
        records_written: u64,
        records_skipped: u64,
    },
    /// A sub-pass stopped early; the other sub-pass may still run.
    SubPassFailed {
        pass_id: String,
        resource: String,
        /// The page being processed when the failure happened
        page: u32,
        message: String,
    },
    /// Both sub-passes ran (possibly with recorded sub-pass errors).
    PassCompleted {
        pass_id: String,
        product_pages: u32,
        membership_pages: u32,
        duration_ms: u64,
    },
    /// Cancellation was observed and the pass stopped.
    PassCancelled { pass_id: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::PassStarted { .. } => "Sync pass started",
            SyncEvent::PageProcessed { .. } => "Sync page processed",
            SyncEvent::SubPassFailed { .. } => "Sync sub-pass failed",
            SyncEvent::PassCompleted { .. } => "Sync pass completed",
            SyncEvent::PassCancelled { .. } => "Sync pass cancelled",
        }
    }
}

// ============================================================================
// Notification Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NotificationEvent {
    /// A bulk send to every member of a product finished.
    BulkSendCompleted {
        product_id: String,
        attempted: u64,
        sent: u64,
        failed: u64,
    },
}

impl NotificationEvent {
    fn description(&self) -> &str {
        match self {
            NotificationEvent::BulkSendCompleted { .. } => "Bulk notification completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls more than `capacity` events behind receives
    /// `RecvError::Lagged` on its next `recv`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
