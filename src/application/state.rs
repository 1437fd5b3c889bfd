// src/application/state.rs
//
// Application state: wires the database, repositories, event bus, sync
// dispatcher and services together.

use std::sync::Arc;

use crate::config::{Settings, SharedSettings};
use crate::db::{create_connection_pool, get_connection, initialize_database, ConnectionPool};
use crate::error::AppResult;
use crate::events::{register_import_handlers, EventBus, Subscription};
use crate::repositories::RepositorySet;
use crate::services::{
    QueuedSyncDispatcher, RemoteSyncClient, StatisticsService, UserDataService, VoteService,
};

/// All fields are Arc-wrapped for sharing across callers and threads.
pub struct AppState {
    pub settings: SharedSettings,
    pub pool: Arc<ConnectionPool>,
    pub repositories: RepositorySet,
    pub event_bus: Arc<EventBus>,
    pub sync_dispatcher: Arc<QueuedSyncDispatcher>,
    pub statistics_service: Arc<StatisticsService>,
    pub user_data_service: Arc<UserDataService>,
    pub vote_service: Arc<VoteService>,
    import_subscription: Subscription,
}

impl AppState {
    /// Build the whole service graph. Must run inside a tokio runtime,
    /// which hosts the sync dispatcher worker.
    pub fn initialize(settings: Settings, remote_client: Arc<dyn RemoteSyncClient>) -> AppResult<Self> {
        let pool = Arc::new(create_connection_pool(&settings)?);
        {
            let conn = get_connection(&pool)?;
            initialize_database(&conn)?;
        }

        let settings = settings.shared();
        let repositories = RepositorySet::sqlite(Arc::clone(&pool));
        let event_bus = Arc::new(EventBus::new());
        let sync_dispatcher = Arc::new(QueuedSyncDispatcher::start(remote_client)?);

        let statistics_service = Arc::new(StatisticsService::new(
            repositories.clone(),
            Arc::clone(&event_bus),
        ));

        let user_data_service = Arc::new(UserDataService::new(
            repositories.clone(),
            statistics_service.clone(),
            sync_dispatcher.clone(),
            Arc::clone(&event_bus),
            Arc::clone(&settings),
        ));

        let vote_service = Arc::new(VoteService::new(
            repositories.clone(),
            sync_dispatcher.clone(),
            Arc::clone(&event_bus),
        ));

        let import_subscription = register_import_handlers(&event_bus, Arc::clone(&user_data_service));

        log::info!("WatchHub state initialized");

        Ok(Self {
            settings,
            pool,
            repositories,
            event_bus,
            sync_dispatcher,
            statistics_service,
            user_data_service,
            vote_service,
            import_subscription,
        })
    }

    /// Detach listeners and drain pending sync jobs.
    pub async fn shutdown(self) {
        drop(self.import_subscription);
        self.sync_dispatcher.shutdown().await;
        log::info!("WatchHub state shut down");
    }
}
