use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{db::StoreError, error::AppResult, stock::StockError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceMode {
    /// `/v1` semantics: read, wait, overwrite.
    Unguarded,
    /// `/v2` semantics: read version, conditional write, optional retry.
    Guarded,
}

#[derive(Debug, Deserialize)]
pub struct RaceParams {
    pub product_id: Uuid,
    pub mode: RaceMode,
    /// Concurrent writers (default: 10)
    pub writers: Option<usize>,
    /// Delta each writer applies (default: 1)
    pub delta: Option<i64>,
    /// Guarded mode only: attempts per writer before giving up (default: 1 = no retry)
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RaceReport {
    pub mode: RaceMode,
    pub writers: usize,
    pub delta: i64,
    pub max_attempts: u32,

    pub initial_quantity: i64,
    pub initial_version: i64,
    pub final_quantity: i64,
    pub final_version: i64,

    pub successes: u64,
    pub conflicts: u64,
    pub retries: u64,
    pub errors: u64,

    /// Sum of deltas whose callers were told they succeeded.
    pub acknowledged_delta: i64,
    /// What actually changed in the store.
    pub applied_delta: i64,
    /// Acknowledged but missing from the store.
    pub lost_delta: i64,

    pub total_elapsed_ms: f64,
}

/// Acknowledged vs applied deltas, computed wide and narrowed back to `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeltaTally {
    acknowledged: i64,
    applied: i64,
    lost: i64,
}

impl DeltaTally {
    fn compute(successes: u64, delta: i64, before: i64, after: i64) -> Result<Self, StoreError> {
        let acknowledged = i128::from(successes) * i128::from(delta);
        let applied = i128::from(after) - i128::from(before);
        let narrow = |what: &str, v: i128| {
            i64::try_from(v).map_err(|_| StoreError::Overflow(format!("{what} delta {v}")))
        };
        Ok(Self {
            acknowledged: narrow("acknowledged", acknowledged)?,
            applied: narrow("applied", applied)?,
            lost: narrow("lost", acknowledged - applied)?,
        })
    }
}

#[derive(Default)]
struct Counters {
    successes: AtomicU64,
    conflicts: AtomicU64,
    retries: AtomicU64,
    errors: AtomicU64,
}

// ── POST /api/race ────────────────────────────────────────────────────────────

pub async fn run_race(
    State(state): State<AppState>,
    Json(params): Json<RaceParams>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let report = race(&state, &params).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "report": report }))))
}

/// Fire `writers` concurrent stock updates at one product and compare what
/// callers were told against what the store ended up with.
pub async fn race(state: &AppState, params: &RaceParams) -> AppResult<RaceReport> {
    let writers = params.writers.unwrap_or(10).clamp(1, 100);
    let delta = params.delta.unwrap_or(1);
    let max_attempts = params.max_attempts.unwrap_or(1).clamp(1, 50);
    let id = params.product_id;

    // Every writer could be acknowledged, so the total must fit before any write.
    (writers as i64).checked_mul(delta).ok_or_else(|| {
        StoreError::Overflow(format!("{writers} writers x delta {delta}"))
    })?;

    let initial = state.stock.level(id).await?;

    info!(
        %id,
        mode = ?params.mode,
        writers,
        delta,
        max_attempts,
        "Starting race"
    );

    let counters = Arc::new(Counters::default());
    // all writers start together
    let barrier = Arc::new(Barrier::new(writers));

    let total_start = Instant::now();
    let mut join_set: JoinSet<()> = JoinSet::new();

    for _ in 0..writers {
        let stock = state.stock.clone();
        let unguarded = state.unguarded.clone();
        let counters = Arc::clone(&counters);
        let barrier = Arc::clone(&barrier);
        let mode = params.mode;

        join_set.spawn(async move {
            barrier.wait().await;

            match mode {
                RaceMode::Unguarded => match unguarded.adjust(id, delta).await {
                    Ok(_) => {
                        counters.successes.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("Race writer error: {}", e);
                        counters.errors.fetch_add(1, Ordering::Relaxed);
                    }
                },
                RaceMode::Guarded => {
                    for attempt in 1..=max_attempts {
                        let seen = match stock.level(id).await {
                            Ok(level) => level.version,
                            Err(e) => {
                                warn!("Race writer error: {}", e);
                                counters.errors.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        };
                        match stock.conditional_adjust(id, delta, seen).await {
                            Ok(_) => {
                                counters.successes.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(e) if e.is_retryable() => {
                                if matches!(e, StockError::Conflict { .. }) {
                                    counters.conflicts.fetch_add(1, Ordering::Relaxed);
                                } else {
                                    warn!("Race writer retryable error: {}", e);
                                    counters.errors.fetch_add(1, Ordering::Relaxed);
                                }
                                if attempt < max_attempts {
                                    counters.retries.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(e) => {
                                warn!("Race writer error: {}", e);
                                counters.errors.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    // Wait for all tasks
    while let Some(joined) = join_set.join_next().await {
        if let Err(e) = joined {
            warn!("Race writer panicked: {}", e);
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    let total_elapsed = total_start.elapsed();
    let after = state.stock.level(id).await?;

    let successes = counters.successes.load(Ordering::Relaxed);
    let tally = DeltaTally::compute(successes, delta, initial.quantity, after.quantity)?;

    let report = RaceReport {
        mode: params.mode,
        writers,
        delta,
        max_attempts,
        initial_quantity: initial.quantity,
        initial_version: initial.version,
        final_quantity: after.quantity,
        final_version: after.version,
        successes,
        conflicts: counters.conflicts.load(Ordering::Relaxed),
        retries: counters.retries.load(Ordering::Relaxed),
        errors: counters.errors.load(Ordering::Relaxed),
        acknowledged_delta: tally.acknowledged,
        applied_delta: tally.applied,
        lost_delta: tally.lost,
        total_elapsed_ms: total_elapsed.as_secs_f64() * 1000.0,
    };

    info!(
        %id,
        successes = report.successes,
        conflicts = report.conflicts,
        lost_delta = report.lost_delta,
        "Race complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InventoryStore, MemoryStore};
    use crate::models::NewProduct;
    use std::time::Duration;

    async fn setup(unguarded_delay: Duration) -> (AppState, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let p = store
            .insert(&NewProduct {
                sku: "PROD-0001".to_string(),
                name: "Produto".to_string(),
                ncm: "10000001".to_string(),
                price_cents: 100,
                quantity: 100,
            })
            .await
            .unwrap();
        (AppState::new(store, Duration::from_secs(5), unguarded_delay), p.id)
    }

    fn params(id: Uuid, mode: RaceMode, writers: usize, max_attempts: u32) -> RaceParams {
        RaceParams {
            product_id: id,
            mode,
            writers: Some(writers),
            delta: Some(5),
            max_attempts: Some(max_attempts),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unguarded_race_loses_acknowledged_updates() {
        let (state, id) = setup(Duration::from_millis(50)).await;
        let report = race(&state, &params(id, RaceMode::Unguarded, 5, 1)).await.unwrap();

        assert_eq!(report.successes, 5);
        assert_eq!(report.acknowledged_delta, 25);
        assert!(report.lost_delta > 0, "{report:?}");
        assert_eq!(report.final_version, 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn guarded_race_never_loses_an_acknowledged_update() {
        let (state, id) = setup(Duration::ZERO).await;
        let report = race(&state, &params(id, RaceMode::Guarded, 12, 1)).await.unwrap();

        assert!(report.successes >= 1);
        assert_eq!(report.successes + report.conflicts + report.errors, 12);
        assert_eq!(report.errors, 0);
        assert_eq!(report.retries, 0);
        assert_eq!(report.lost_delta, 0);
        assert_eq!(report.final_version - report.initial_version, report.successes as i64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn guarded_race_with_retries_applies_every_delta() {
        let (state, id) = setup(Duration::ZERO).await;
        let report = race(&state, &params(id, RaceMode::Guarded, 8, 50)).await.unwrap();

        assert_eq!(report.successes, 8);
        assert_eq!(report.final_quantity, 140);
        assert_eq!(report.lost_delta, 0);
        assert_eq!(report.retries, report.conflicts);
    }

    #[tokio::test]
    async fn oversized_delta_is_rejected_before_any_write() {
        let (state, id) = setup(Duration::ZERO).await;
        let mut p = params(id, RaceMode::Unguarded, 5, 1);
        p.delta = Some(i64::MAX / 3);

        let err = race(&state, &p).await.unwrap_err();
        assert!(
            matches!(err, crate::error::AppError::Store(StoreError::Overflow(_))),
            "got {err:?}"
        );
        let level = state.stock.level(id).await.unwrap();
        assert_eq!((level.quantity, level.version), (100, 1));
    }

    #[test]
    fn tally_survives_extreme_quantities() {
        let tally = DeltaTally::compute(2, i64::MAX / 3, 0, i64::MAX / 3).unwrap();
        assert_eq!(tally.acknowledged, i64::MAX / 3 * 2);
        assert_eq!(tally.lost, i64::MAX / 3);

        let err = DeltaTally::compute(0, 1, i64::MIN, i64::MAX).unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));

        let err = DeltaTally::compute(u64::MAX, i64::MAX, 0, 0).unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));
    }

    #[tokio::test]
    async fn unknown_product_is_rejected_up_front() {
        let (state, _) = setup(Duration::ZERO).await;
        let err = race(&state, &params(Uuid::new_v4(), RaceMode::Guarded, 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Stock(StockError::NotFound(_))));
    }
}
