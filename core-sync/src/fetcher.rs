//! # Page Fetcher
//!
//! Retrieves one page of a remote collection and turns raw records into
//! validated models.
//!
//! ## Overview
//!
//! - [`PageSource`] is the seam the coordinator depends on
//! - [`HttpPageFetcher`] implements it over any [`HttpClient`]
//! - `normalize_*` functions map loosely-shaped JSON records onto
//!   [`NewProduct`] / [`NewMembership`], dropping records without a key
//!
//! The fetcher performs a single attempt per call. Pacing between pages and
//! retrying on the next pass are the coordinator's and scheduler's concern.

use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_library::models::{NewMembership, NewProduct};
use core_runtime::config::SyncEngineConfig;
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// Remote collections the engine mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncResource {
    Products,
    Memberships,
}

impl SyncResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncResource::Products => "products",
            SyncResource::Memberships => "memberships",
        }
    }

    /// API path of the collection, relative to the base URL
    pub fn path(&self) -> &'static str {
        match self {
            SyncResource::Products => "/api/v2/products",
            SyncResource::Memberships => "/api/v2/memberships",
        }
    }

    /// Key under which the page cursor for this resource is stored
    pub fn cursor_key(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for SyncResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of raw records
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub items: Vec<Value>,
    /// Total number of pages reported by the server, at least 1
    pub total_pages: u32,
}

/// Source of paginated records.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch page `page` (1-based) of `resource`.
    ///
    /// # Errors
    ///
    /// - `SyncError::InvalidInput` if `page` is 0
    /// - `SyncError::Fetch` on transport failure, non-2xx status or an
    ///   unreadable body
    async fn fetch_page(&self, resource: SyncResource, page: u32) -> Result<FetchedPage>;
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    pagination: Option<PaginationInfo>,
    #[serde(default)]
    total_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PaginationInfo {
    #[serde(default)]
    total_page: Option<u32>,
}

impl PageEnvelope {
    fn into_page(self) -> FetchedPage {
        let total_pages = self
            .pagination
            .and_then(|p| p.total_page)
            .or(self.total_page)
            .unwrap_or(1)
            .max(1);

        FetchedPage {
            items: self.data.unwrap_or_default(),
            total_pages,
        }
    }
}

/// [`PageSource`] backed by the remote REST API.
pub struct HttpPageFetcher {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_token: String,
    per_page: u32,
    request_timeout: Option<Duration>,
}

impl HttpPageFetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        per_page: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            per_page,
            request_timeout: None,
        }
    }

    pub fn from_config(http: Arc<dyn HttpClient>, config: &SyncEngineConfig) -> Self {
        Self::new(
            http,
            config.base_url.clone(),
            config.api_token.clone(),
            config.per_page,
        )
        .with_request_timeout(config.request_timeout)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn page_url(&self, resource: SyncResource, page: u32) -> String {
        format!(
            "{}{}?page={}&per={}",
            self.base_url,
            resource.path(),
            page,
            self.per_page
        )
    }
}

#[async_trait]
impl PageSource for HttpPageFetcher {
    async fn fetch_page(&self, resource: SyncResource, page: u32) -> Result<FetchedPage> {
        if page == 0 {
            return Err(SyncError::InvalidInput(
                "page numbers start at 1".to_string(),
            ));
        }

        let fetch_error = |message: String| SyncError::Fetch {
            resource,
            page,
            message,
        };

        let url = self.page_url(resource, page);
        let mut request = HttpRequest::get(&url)
            .bearer_token(&self.api_token)
            .accept_json();
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        debug!(resource = %resource, page, url = %url, "Fetching page");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.is_success() {
            let preview: String = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_PREVIEW_CHARS)
                .collect();
            return Err(fetch_error(format!("HTTP {}: {}", response.status, preview)));
        }

        let envelope: PageEnvelope = response
            .json()
            .map_err(|e| fetch_error(e.to_string()))?;
        let fetched = envelope.into_page();

        debug!(
            resource = %resource,
            page,
            items = fetched.items.len(),
            total_pages = fetched.total_pages,
            "Page fetched"
        );

        Ok(fetched)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Interpret a JSON value as an identifier: non-blank strings (trimmed) and
/// numbers (stringified).
fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First key among `keys` holding a non-empty string.
fn first_text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match raw.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// A product reference: an id, or an embedded object carrying one.
fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => value.get("id").and_then(id_value),
        other => id_value(other),
    }
}

/// Map a raw product record. Returns `None` when it has no usable `id`.
pub fn normalize_product(raw: &Value) -> Option<NewProduct> {
    let product_id = raw.get("id").and_then(id_value)?;

    Some(NewProduct {
        product_id,
        visibility: first_text(raw, &["visibility", "status", "marketplaceStatus"]),
        title: first_text(raw, &["title", "name"]),
    })
}

/// Map a raw membership record. Returns `None` when it has no usable `id`.
pub fn normalize_membership(raw: &Value) -> Option<NewMembership> {
    let membership_id = raw.get("id").and_then(id_value)?;

    let product_id = ["product", "productId"]
        .iter()
        .find_map(|key| raw.get(key).and_then(reference_id));

    Some(NewMembership {
        membership_id,
        user_id: raw.get("user").and_then(reference_id),
        email: first_text(raw, &["email"]),
        product_id,
    })
}

/// Normalize a page of products, logging each skipped record.
///
/// Returns the normalized products and the number skipped.
pub fn normalize_products(items: &[Value], page: u32) -> (Vec<NewProduct>, usize) {
    normalize_all(items, page, SyncResource::Products, normalize_product)
}

/// Normalize a page of memberships, logging each skipped record.
pub fn normalize_memberships(items: &[Value], page: u32) -> (Vec<NewMembership>, usize) {
    normalize_all(items, page, SyncResource::Memberships, normalize_membership)
}

/// The record's email, masked for logging.
fn redacted_email(raw: &Value) -> Option<String> {
    first_text(raw, &["email"]).map(|email| redact_if_sensitive("email", &email))
}

fn normalize_all<T>(
    items: &[Value],
    page: u32,
    resource: SyncResource,
    normalize: fn(&Value) -> Option<T>,
) -> (Vec<T>, usize) {
    let mut normalized = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for (index, raw) in items.iter().enumerate() {
        match normalize(raw) {
            Some(record) => normalized.push(record),
            None => {
                skipped += 1;
                warn!(
                    resource = %resource,
                    page,
                    index,
                    email = redacted_email(raw).as_deref().unwrap_or("-"),
                    "Skipping record without a usable id"
                );
            }
        }
    }

    (normalized, skipped)
}
