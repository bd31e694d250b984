use std::sync::Arc;

use inventory_occ::config::{Config, StoreBackend};
use inventory_occ::db::{InventoryStore, MemoryStore, PgStore};
use inventory_occ::{build_router, seed, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,inventory_occ=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Inventory OCC — Rust + Axum         ║");
    info!("║  v1 unguarded · v2 optimistic lock   ║");
    info!("╚══════════════════════════════════════╝");

    let store: Arc<dyn InventoryStore> = match &config.store {
        StoreBackend::Postgres { database_url } => {
            let pg = PgStore::connect(database_url, config.max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store (state is lost on exit).");
            Arc::new(MemoryStore::new())
        }
    };

    if config.seed_on_start {
        seed::seed_demo_catalog(store.as_ref()).await?;
    }

    let state = AppState::from_config(store, &config);
    let app = build_router(state);

    let addr = config.bind_addr();
    info!("Listening on http://{}", addr);
    info!(
        "Quick-start: GET http://{}/api/products  →  then PUT http://{}/v2/products/<id>/stock?delta=5&version=<version>",
        addr, addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
