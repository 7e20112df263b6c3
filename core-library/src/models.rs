//! Domain models for the mirrored catalog
//!
//! `New*` types carry what the remote API provides; the stored types add the
//! columns the store maintains itself (timestamps, counters).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Current time as unix epoch seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// =============================================================================
// Products
// =============================================================================

/// A product as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Product {
    /// Remote identifier (natural key)
    pub product_id: String,
    /// Marketplace visibility, as reported by the last sync
    pub visibility: Option<String>,
    pub title: Option<String>,
    /// Memberships counted toward this product during ingestion
    pub active_users: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A product as normalized from one remote record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: String,
    pub visibility: Option<String>,
    pub title: Option<String>,
}

impl NewProduct {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            visibility: None,
            title: None,
        }
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = Some(visibility.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Validate product data
    pub fn validate(&self) -> Result<(), String> {
        if self.product_id.trim().is_empty() {
            return Err("Product id cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Product plus the number of stored memberships that reference it.
///
/// `membership_count` is computed at read time; `active_users` is the
/// incrementally maintained counter. The two agree once every membership
/// has been ingested after its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProductSummary {
    pub product_id: String,
    pub visibility: Option<String>,
    pub title: Option<String>,
    pub active_users: i64,
    pub membership_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

// =============================================================================
// Memberships
// =============================================================================

/// A membership as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    /// Remote identifier (natural key)
    pub membership_id: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// Product this membership grants; may not exist locally yet
    pub product_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A membership as normalized from one remote record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMembership {
    pub membership_id: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub product_id: Option<String>,
}

impl NewMembership {
    pub fn new(membership_id: impl Into<String>) -> Self {
        Self {
            membership_id: membership_id.into(),
            user_id: None,
            email: None,
            product_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Validate membership data
    pub fn validate(&self) -> Result<(), String> {
        if self.membership_id.trim().is_empty() {
            return Err("Membership id cannot be empty".to_string());
        }

        if let Some(product_id) = &self.product_id {
            if product_id.trim().is_empty() {
                return Err("Membership product id cannot be blank".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_validation() {
        assert!(NewProduct::new("prod_1").validate().is_ok());
        assert!(NewProduct::new("   ").validate().is_err());
    }

    #[test]
    fn test_new_membership_builder() {
        let membership = NewMembership::new("mem_1")
            .with_user("user_1")
            .with_email("a@b.co")
            .with_product("prod_1");

        assert_eq!(membership.user_id.as_deref(), Some("user_1"));
        assert_eq!(membership.product_id.as_deref(), Some("prod_1"));
        assert!(membership.validate().is_ok());
    }

    #[test]
    fn test_new_membership_validation() {
        assert!(NewMembership::new("").validate().is_err());
        assert!(NewMembership::new("mem_1")
            .with_product(" ")
            .validate()
            .is_err());
        assert!(NewMembership::new("mem_1").validate().is_ok());
    }
}
