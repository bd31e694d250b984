use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{error::AppResult, seed, AppState};

#[derive(Debug, Deserialize)]
pub struct SeedParams {
    /// Number of products to seed (default: 100, max: 10 000)
    pub count: Option<usize>,
}

// ── POST /api/seed ────────────────────────────────────────────────────────────

pub async fn seed_data(
    State(state): State<AppState>,
    Query(params): Query<SeedParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let count = params.count.unwrap_or(100).min(10_000);

    let start = Instant::now();
    let products = seed::seed_products(state.store.as_ref(), count).await?;
    let seed_elapsed = start.elapsed();

    let total_in_db = state.store.count().await?;

    info!(
        seeded = products.len(),
        total_in_db,
        seed_ms = seed_elapsed.as_millis(),
        "Seeding complete"
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "seeded": products.len(),
            "total_in_db": total_in_db,
            "seed_time_ms": seed_elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}
