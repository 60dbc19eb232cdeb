use crate::broadcast::BroadcastHub;
use crate::config::Config;
use crate::db::connection::{DbPool, get_pool_stats, init_db};
use crate::error::PollError;
use crate::ingress::IngressAdapter;
use crate::registry::PollRegistry;
use crate::store::{PgPollStore, SharedStore};
use std::sync::Arc;
use tokio::time::{Duration, interval};

#[derive(Clone, Debug)]
pub struct AppState {
    pub ingress: IngressAdapter,
    pub hub: BroadcastHub,
    pub registry: PollRegistry,
}

impl AppState {
    /// Wires the engine around any store. Must run inside a tokio runtime.
    pub fn with_store(
        store: SharedStore,
        vote_queue_capacity: usize,
        subscriber_buffer: usize,
    ) -> Self {
        let hub = BroadcastHub::new(subscriber_buffer);
        let registry = PollRegistry::new(store.clone(), hub.clone(), vote_queue_capacity);
        let ingress = IngressAdapter::new(store, registry.clone(), hub.clone());

        AppState {
            ingress,
            hub,
            registry,
        }
    }

    /// Connects to Postgres, starts aggregators for existing polls and the
    /// pool health check.
    pub async fn connect(config: &Config) -> Result<Self, PollError> {
        let db = init_db(&config.database_url, config.db_max_connections).await?;
        info!("Connected to database");

        let store = PgPollStore::new(db.clone());
        let state = Self::with_store(
            Arc::new(store),
            config.vote_queue_capacity,
            config.subscriber_buffer,
        );

        let polls = state.ingress.list_polls().await?;
        state.registry.hydrate(&polls);

        spawn_health_check(db);

        Ok(state)
    }
}

fn spawn_health_check(db: DbPool) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match db.acquire().await {
                Ok(conn) => {
                    drop(conn);
                    debug!("{}", get_pool_stats(&db));
                }
                Err(e) => {
                    error!("Database connection health check failed: {}", e);
                }
            }
        }
    });
}
