//! Core service façade and bootstrap helpers.
//!
//! This crate wires the store, the HTTP bridge and the sync engine into a
//! single [`SyncService`] handle. Server and desktop hosts enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) to get
//! [`SyncService::bootstrap`]; other hosts pass their own
//! [`HttpClient`](bridge_traits::http::HttpClient) to
//! [`SyncService::with_http_client`].
//!
//! ```no_run
//! # #[cfg(feature = "desktop-shims")]
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::SyncEngineConfig;
//! use core_service::SyncService;
//!
//! let config = SyncEngineConfig::from_env()?;
//! let service = SyncService::bootstrap(config).await?;
//! let scheduler = service.start_scheduler();
//!
//! let products = service.read_api().list_products().await?;
//! println!("{} products", products.len());
//!
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod read_api;
mod service;

pub use error::{CoreError, Result};
pub use read_api::{NotifyReport, ProductDetail, ReadApi};
pub use service::SyncService;
