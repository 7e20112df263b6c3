use crate::{read_api::ReadApi, CoreError, Result};
use bridge_traits::http::HttpClient;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::repositories::{
    MembershipRepository, ProductRepository, SqliteMembershipRepository, SqliteProductRepository,
};
use core_runtime::config::SyncEngineConfig;
use core_runtime::events::EventBus;
use core_sync::{
    AggregateMaintainer, HttpPageFetcher, PassReport, SchedulerHandle, SqliteSyncCursorStore,
    SyncConfig, SyncCoordinator, SyncScheduler,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fully wired sync engine: store, fetcher, coordinator and read side.
#[derive(Clone)]
pub struct SyncService {
    config: Arc<SyncEngineConfig>,
    coordinator: Arc<SyncCoordinator>,
    read_api: ReadApi,
    event_bus: EventBus,
}

impl SyncService {
    /// Open the store and wire the engine around the default reqwest client.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap(config: SyncEngineConfig) -> Result<Self> {
        use bridge_desktop::ReqwestHttpClient;

        let http = ReqwestHttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        Self::with_http_client(config, Arc::new(http)).await
    }

    /// Open the store and wire the engine around the given HTTP client.
    pub async fn with_http_client(
        config: SyncEngineConfig,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(DatabaseConfig::new(config.database_path.clone()))
            .await
            .map_err(|e| {
                CoreError::InitializationFailed(format!(
                    "Failed to open store at {}: {}",
                    config.database_path.display(),
                    e
                ))
            })?;

        let service = Self::assemble(config, pool, http);
        info!(base_url = %service.config.base_url, "Sync service ready");
        Ok(service)
    }

    /// Wire the engine over an already migrated pool.
    pub fn assemble(config: SyncEngineConfig, pool: SqlitePool, http: Arc<dyn HttpClient>) -> Self {
        let event_bus = EventBus::default();

        let products: Arc<dyn ProductRepository> =
            Arc::new(SqliteProductRepository::new(pool.clone()));
        let memberships: Arc<dyn MembershipRepository> =
            Arc::new(SqliteMembershipRepository::new(pool.clone()));

        let coordinator = SyncCoordinator::new(
            SyncConfig::from(&config),
            Arc::new(HttpPageFetcher::from_config(http, &config)),
            products.clone(),
            memberships.clone(),
            Arc::new(SqliteSyncCursorStore::new(pool.clone())),
            AggregateMaintainer::new(pool),
            event_bus.clone(),
        );

        Self {
            config: Arc::new(config),
            coordinator: Arc::new(coordinator),
            read_api: ReadApi::new(products, memberships, event_bus.clone()),
            event_bus,
        }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    /// Run a single pass now.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<PassReport> {
        Ok(self.coordinator.run_pass(cancel).await?)
    }

    /// Start periodic passes at the configured poll interval.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        SyncScheduler::new(self.coordinator.clone(), self.config.poll_interval).spawn()
    }

    pub fn read_api(&self) -> ReadApi {
        self.read_api.clone()
    }

    pub fn events(&self) -> EventBus {
        self.event_bus.clone()
    }
}
