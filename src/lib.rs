//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on
//! `membership-sync-workspace` and enable `desktop-shims` to get the
//! reqwest-backed sync service without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{ReadApi, SyncService};
