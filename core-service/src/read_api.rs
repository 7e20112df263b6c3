//! Read-only queries over the synced store, plus bulk notification of a
//! product's members.

use crate::{CoreError, Result};
use bridge_traits::messaging::MessageSender;
use core_library::models::{Membership, Product, ProductSummary};
use core_library::repositories::{MembershipRepository, ProductRepository};
use core_runtime::events::{CoreEvent, EventBus, NotificationEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A product with the memberships that reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub memberships: Vec<Membership>,
}

/// Result of messaging every member of a product
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub attempted: u64,
    pub sent: u64,
    /// `(membership_id, error)` for every delivery that did not succeed
    pub failed: Vec<(String, String)>,
}

/// Query surface for hosts. Never writes to the store.
#[derive(Clone)]
pub struct ReadApi {
    products: Arc<dyn ProductRepository>,
    memberships: Arc<dyn MembershipRepository>,
    event_bus: EventBus,
}

impl ReadApi {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        memberships: Arc<dyn MembershipRepository>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            products,
            memberships,
            event_bus,
        }
    }

    /// Every product with its live membership count.
    pub async fn list_products(&self) -> Result<Vec<ProductSummary>> {
        Ok(self.products.find_all_with_membership_counts().await?)
    }

    /// The product and its memberships, or `None` if the product is unknown.
    pub async fn product_detail(&self, product_id: &str) -> Result<Option<ProductDetail>> {
        let Some(product) = self.products.find_by_id(product_id).await? else {
            return Ok(None);
        };
        let memberships = self.memberships.find_by_product(product_id).await?;

        Ok(Some(ProductDetail {
            product,
            memberships,
        }))
    }

    pub async fn memberships_for_product(&self, product_id: &str) -> Result<Vec<Membership>> {
        Ok(self.memberships.find_by_product(product_id).await?)
    }

    /// Send `text` once to the user behind each membership of `product_id`.
    ///
    /// Deliveries are sequential. Memberships without a user id are reported
    /// as failed without calling the sender.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` for blank text, or a library error
    /// if the memberships cannot be read. Delivery failures are reported in
    /// the [`NotifyReport`].
    #[instrument(skip(self, text, sender))]
    pub async fn notify_product_members(
        &self,
        product_id: &str,
        text: &str,
        sender: &dyn MessageSender,
    ) -> Result<NotifyReport> {
        if text.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "Message cannot be empty".to_string(),
            ));
        }

        let memberships = self.memberships.find_by_product(product_id).await?;
        let mut report = NotifyReport::default();

        for membership in memberships {
            report.attempted += 1;

            let Some(user_id) = membership.user_id.as_deref() else {
                report
                    .failed
                    .push((membership.membership_id, "No user ID".to_string()));
                continue;
            };

            let result = sender.send_message(user_id, text).await;
            if result.success {
                report.sent += 1;
            } else {
                let error = result
                    .error
                    .unwrap_or_else(|| "Unknown delivery error".to_string());
                warn!(membership_id = %membership.membership_id, error = %error, "Message not delivered");
                report.failed.push((membership.membership_id, error));
            }
        }

        info!(
            attempted = report.attempted,
            sent = report.sent,
            failed = report.failed.len(),
            "Bulk message finished"
        );
        self.event_bus
            .emit(CoreEvent::Notification(NotificationEvent::BulkSendCompleted {
                product_id: product_id.to_string(),
                attempted: report.attempted,
                sent: report.sent,
                failed: report.failed.len() as u64,
            }))
            .ok();

        Ok(report)
    }
}
