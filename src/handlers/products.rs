use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{NewProduct, Page, PageParams},
    AppState,
};

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let page = Page::from(&params);

    let start = Instant::now();
    let products = state.store.list(page).await?;
    let elapsed = start.elapsed();

    info!(
        count = products.len(),
        limit = page.limit,
        offset = page.offset,
        elapsed_ms = elapsed.as_millis(),
        "Listed products"
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": products,
            "count": products.len(),
            "limit": page.limit,
            "offset": page.offset,
            "query_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    payload.validate().map_err(AppError::BadRequest)?;

    let start = Instant::now();
    let product = state.store.insert(&payload).await?;
    let elapsed = start.elapsed();

    info!(id = %product.id, sku = %product.sku, quantity = product.quantity, "Created product");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "data": product,
            "db_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let product = state.stock.current(id).await?;
    let elapsed = start.elapsed();

    info!(%id, version = product.version, "Fetched product");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": product,
            "query_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}
