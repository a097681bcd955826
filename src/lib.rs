pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use cache::SeatMapCache;
use services::BookingService;
use store::{BookingStore, MemoryStore, PgStore};

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub booking: BookingService,
    pub config: config::Config,
}

impl AppState {
    /// Connects the configured store and cache. Runs migrations on Postgres.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn BookingStore> = match config.database.url.as_deref() {
            Some(url) => {
                let db = database::Database::connect(&config.database, url).await?;
                info!("Database connected");
                db.run_migrations().await?;
                Arc::new(PgStore::new(db.pool, config.booking.lock_wait()))
            }
            None => {
                warn!("DATABASE_URL not set, bookings live in process memory only");
                Arc::new(MemoryStore::new())
            }
        };

        let cache = match config.redis.url.as_deref() {
            Some(url) => {
                let redis = redis_client::RedisClient::connect(url).await?;
                info!("Redis connected, seat maps cached for {}s", config.redis.seat_map_ttl_secs);
                SeatMapCache::new(redis, Duration::from_secs(config.redis.seat_map_ttl_secs))
            }
            None => SeatMapCache::disabled(),
        };

        Ok(Self::with_parts(store, cache, config))
    }

    pub fn with_parts(
        store: Arc<dyn BookingStore>,
        cache: SeatMapCache,
        config: config::Config,
    ) -> Arc<Self> {
        let booking = BookingService::new(store, cache, config.booking.clone());
        Arc::new(Self { booking, config })
    }

    /// In-memory store, no cache.
    pub fn in_memory(config: config::Config) -> Arc<Self> {
        Self::with_parts(Arc::new(MemoryStore::new()), SeatMapCache::disabled(), config)
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.app.request_timeout_secs);
    Router::new()
        .route("/", get(|| async { "Showtime Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
