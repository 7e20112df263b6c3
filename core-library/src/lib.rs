//! # Membership Store
//!
//! Owns the local SQLite store that mirrors the remote catalog.
//!
//! ## Overview
//!
//! This crate manages:
//! - Connection pooling, migrations and health checks (`db`)
//! - Product and membership models with validation (`models`)
//! - Repositories with per-record bulk upserts and the read queries used by
//!   the read API (`repositories`)
//!
//! The sync engine is the only writer. Everything else reads.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
