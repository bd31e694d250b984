use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{GuardedAdjustParams, UnguardedAdjustParams},
    AppState,
};

// ── PUT /v1/products/:id/stock?delta= ─────────────────────────────────────────

/// Read-modify-write with no concurrency control. Overlapping calls lose updates.
pub async fn adjust_unguarded(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UnguardedAdjustParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let level = state.unguarded.adjust(id, params.delta).await?;
    let elapsed = start.elapsed();

    info!(%id, delta = params.delta, quantity = level.quantity, "Unguarded stock update");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": {
                "id": id,
                "quantity": level.quantity,
                "version": level.version,
            },
            "db_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── PUT /v2/products/:id/stock?delta=&version= ────────────────────────────────

/// Optimistic update: applies only if `version` is still current, otherwise 409.
pub async fn adjust_guarded(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<GuardedAdjustParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let adjustment = state
        .stock
        .conditional_adjust(id, params.delta, params.version)
        .await?;
    let elapsed = start.elapsed();

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": adjustment,
            "db_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}
