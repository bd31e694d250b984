use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod seed;
pub mod stock;

use crate::config::Config;
use crate::db::InventoryStore;
use crate::stock::{StockUpdater, UnguardedAdjuster};

/// Shared application state; cheap to clone (all heap behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InventoryStore>,
    pub stock: StockUpdater,
    pub unguarded: UnguardedAdjuster,
}

impl AppState {
    pub fn new(store: Arc<dyn InventoryStore>, store_timeout: Duration, unguarded_delay: Duration) -> Self {
        Self {
            stock: StockUpdater::new(store.clone(), store_timeout),
            unguarded: UnguardedAdjuster::new(store.clone(), unguarded_delay),
            store,
        }
    }

    pub fn from_config(store: Arc<dyn InventoryStore>, config: &Config) -> Self {
        Self::new(store, config.store_timeout, config.unguarded_delay)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Products ────────────────────────────────────────────────────────
        .route(
            "/api/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route("/api/products/:id", get(handlers::products::get_product))

        // ── Stock: unguarded (lost updates) vs guarded (OCC) ────────────────
        .route("/v1/products/:id/stock", put(handlers::stock::adjust_unguarded))
        .route("/v2/products/:id/stock", put(handlers::stock::adjust_guarded))

        // ── Seed ────────────────────────────────────────────────────────────
        .route("/api/seed", post(handlers::seed::seed_data))

        // ── Race demonstration ──────────────────────────────────────────────
        .route("/api/race", post(handlers::race::run_race))

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
