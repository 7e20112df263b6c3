//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the sync engine crates:
//! - Logging and tracing setup
//! - Engine configuration (builder + environment loading)
//! - Event bus for pass/page progress
//!
//! ## Overview
//!
//! Nothing in this crate talks to the network or the database. It holds the
//! conventions other crates depend on: how configuration is validated, how
//! logs are filtered and formatted, and how progress is broadcast.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{SyncEngineConfig, SyncEngineConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, SyncEvent};
