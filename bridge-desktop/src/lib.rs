//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for server and desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls and connection pooling. Each
//!   request is a single attempt; the sync engine retries on its next pass
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::builder()
//!         .timeout(Duration::from_secs(30))
//!         .build()
//!         .expect("http client");
//!
//!     // Hand to the sync engine
//! }
//! ```

mod http;

pub use http::{ReqwestHttpClient, ReqwestHttpClientBuilder};
