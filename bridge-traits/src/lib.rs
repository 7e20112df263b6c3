//! # Host Bridge Traits
//!
//! Abstraction traits for the capabilities the sync engine needs from its
//! host but does not implement itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations against the remote API
//! - [`MessageSender`](messaging::MessageSender) - Outbound single-message delivery
//!
//! ## Implementations
//!
//! | Capability | Implementation Crate |
//! |------------|---------------------|
//! | `HttpClient` | `bridge-desktop` (reqwest) |
//! | `MessageSender` | provided by the host application |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors into it and keep the
//! message actionable (URL, status, timeout).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single handle can be
//! shared between the scheduler task and the read side.

pub mod error;
pub mod http;
pub mod logging;
pub mod messaging;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use logging::LogLevel;
pub use messaging::{MessageResult, MessageSender};
