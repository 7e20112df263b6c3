//! End-to-end tests: a pass over a mocked HTTP API, then the read side.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_library::db::create_test_pool;
use core_runtime::config::SyncEngineConfig;
use core_runtime::events::{CoreEvent, SyncEvent};
use core_service::{CoreError, SyncService};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn config() -> SyncEngineConfig {
    SyncEngineConfig::builder()
        .base_url("https://api.test")
        .api_token("tok_test")
        .page_delay(Duration::ZERO)
        .build()
        .unwrap()
}

/// One page of products and one page of memberships
fn scripted_api() -> MockHttp {
    let mut http = MockHttp::new();
    http.expect_execute().returning(|request| {
        let body = if request.url.contains("/api/v2/products") {
            json!({
                "data": [
                    {"id": "prod_a", "title": "Alpha", "visibility": "visible"},
                    {"id": "prod_b", "title": "Beta", "visibility": "hidden"},
                ],
                "pagination": {"total_page": 1},
            })
        } else {
            json!({
                "data": [
                    {"id": "mem_1", "user": "user_1", "product": "prod_a"},
                    {"id": "mem_2", "user": "user_2", "product": {"id": "prod_a"}},
                    {"id": "mem_3", "user": "user_3", "product": "prod_b"},
                ],
                "pagination": {"total_page": 1},
            })
        };
        Ok(HttpResponse::new(200, body.to_string()))
    });
    http
}

async fn service() -> SyncService {
    let pool = create_test_pool().await.unwrap();
    SyncService::assemble(config(), pool, Arc::new(scripted_api()))
}

#[tokio::test]
async fn test_run_once_then_read() {
    let service = service().await;
    let mut events = service.events().subscribe();

    let report = service.run_once(&CancellationToken::new()).await.unwrap();
    assert!(!report.has_errors());
    assert_eq!(report.memberships.records_written, 3);

    let products = service.read_api().list_products().await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].product_id, "prod_a");
    assert_eq!(products[0].active_users, 2);
    assert_eq!(products[0].membership_count, 2);
    assert_eq!(products[1].active_users, 1);

    let detail = service
        .read_api()
        .product_detail("prod_a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.memberships.len(), 2);

    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Sync(SyncEvent::PassStarted { .. })
    ));
}

#[tokio::test]
async fn test_scheduler_runs_and_shuts_down() {
    let service = service().await;
    let mut events = service.events().subscribe();

    let handle = service.start_scheduler();
    let completed = async {
        while !matches!(
            events.recv().await.unwrap(),
            CoreEvent::Sync(SyncEvent::PassCompleted { .. })
        ) {}
    };
    tokio::time::timeout(Duration::from_secs(5), completed)
        .await
        .expect("scheduled pass did not complete");
    handle.shutdown().await;

    let products = service.read_api().list_products().await.unwrap();
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_opening_store() {
    let mut config = config();
    config.api_token = String::new();

    let mut http = MockHttp::new();
    http.expect_execute().times(0);

    let result = SyncService::with_http_client(config, Arc::new(http)).await;
    assert!(matches!(result, Err(CoreError::Runtime(_))));
}
