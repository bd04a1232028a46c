use std::sync::Arc;

use crate::application::services::channels::{
    BlogPublisher, GoogleBusinessPublisher, MetaPublisher, TikTokPublisher, YouTubePublisher,
};
use crate::application::services::{CircuitBreakerRegistry, Dispatcher, DlqService, QueueService};
use crate::config::Config;
use crate::domain::ports::{BreakerStore, Clock, CredentialProvider, DlqStore, JobStore};
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::{Database, SqlBreakerStore, SqlDlqStore, SqlJobStore};
use crate::infrastructure::providers::EnvCredentialProvider;
use crate::infrastructure::runtime::SystemClock;
use crate::infrastructure::workers::Worker;
use crate::shared::events::LocalEventBus;

pub struct AppContext {
    pub state: AppState,
    pub worker: Arc<Worker>,
    pub event_bus: Arc<LocalEventBus>,
}

pub async fn build_app_state(
    db: Database,
    config: &Config,
) -> Result<AppContext, Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Initialize event bus for queue observers
    let event_bus = Arc::new(LocalEventBus::new(100));
    tracing::info!("Event bus initialized with capacity 100");

    // Stores
    let breaker_store: Arc<dyn BreakerStore> = Arc::new(SqlBreakerStore::new(db.clone()));
    let dlq_store: Arc<dyn DlqStore> = Arc::new(SqlDlqStore::new(db.clone()));
    let job_store: Arc<dyn JobStore> = Arc::new(SqlJobStore::new(
        db.clone(),
        config.retry_policy(),
        dlq_store.clone(),
    ));
    tracing::info!("Job, DLQ and breaker stores initialized");

    // Circuit breaker registry, injected everywhere it is needed
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        config.breaker_config(),
        clock.clone(),
        breaker_store,
    ));

    // Channel publishers share one credential provider
    let credentials: Arc<dyn CredentialProvider> = Arc::new(EnvCredentialProvider);

    let mut dispatcher = Dispatcher::new(
        job_store.clone(),
        breakers.clone(),
        event_bus.clone(),
        clock.clone(),
    );
    dispatcher.register_publisher(Arc::new(BlogPublisher::new(
        config.blog_api_url.as_str(),
        credentials.clone(),
    )));
    dispatcher.register_publisher(Arc::new(MetaPublisher::facebook(
        config.graph_api_url.as_str(),
        credentials.clone(),
    )));
    dispatcher.register_publisher(Arc::new(MetaPublisher::instagram(
        config.graph_api_url.as_str(),
        credentials.clone(),
    )));
    dispatcher.register_publisher(Arc::new(TikTokPublisher::new(
        config.tiktok_api_url.as_str(),
        credentials.clone(),
    )));
    dispatcher.register_publisher(Arc::new(YouTubePublisher::new(
        config.youtube_api_url.as_str(),
        credentials.clone(),
    )));
    dispatcher.register_publisher(Arc::new(GoogleBusinessPublisher::new(
        config.google_business_api_url.as_str(),
        credentials,
    )));
    let dispatcher = Arc::new(dispatcher);
    tracing::info!("Dispatcher initialized with 6 channel publishers");

    let worker = Arc::new(Worker::new(
        job_store.clone(),
        dispatcher,
        clock.clone(),
        config.worker_config(),
    ));

    let queue_service = Arc::new(QueueService::new(job_store.clone(), clock.clone()));
    let dlq_service = Arc::new(DlqService::new(dlq_store, job_store, clock));
    tracing::info!("Queue and DLQ services initialized");

    let state = AppState {
        queue_service,
        dlq_service,
        breakers,
        display_tz: config.display_tz,
    };

    Ok(AppContext {
        state,
        worker,
        event_bus,
    })
}
