//! Outbound Messaging Abstraction
//!
//! The delivery client itself lives with the host (vendor SDK or HTTP API).
//! The core only needs a way to send one text message to one user and learn
//! whether it worked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a single message delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResult {
    pub success: bool,
    pub error: Option<String>,
}

impl MessageResult {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Single-message delivery client
///
/// Implementations report delivery failures through [`MessageResult`] rather
/// than an error type so that bulk senders can keep going.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, user_id: &str, text: &str) -> MessageResult;
}
