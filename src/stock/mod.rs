//! Stock mutation paths.
//!
//! [`StockUpdater`] is the guarded path: optimistic concurrency control over
//! the record's `(quantity, version)` pair, delegated to the store's single
//! conditional write. [`unguarded::UnguardedAdjuster`] is the read-sleep-write
//! path it replaces, kept as a lost-update demonstration.

pub mod unguarded;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{InventoryStore, StoreError};
use crate::models::{Product, StockLevel};

pub use unguarded::UnguardedAdjuster;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("product {0} not found")]
    NotFound(Uuid),

    #[error(
        "concurrency conflict: product {id} was modified by another writer \
         (expected version {expected}, current version {current}); \
         re-read the product and retry"
    )]
    Conflict { id: Uuid, expected: i64, current: i64 },

    #[error("insufficient stock for product {id}: available {available}, requested delta {delta}")]
    InsufficientStock { id: Uuid, available: i64, delta: i64 },

    /// The write may or may not have applied.
    #[error("store round trip timed out after {0:?}; re-read the product before retrying")]
    Timeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StockError {
    /// Whether re-reading and calling again can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Timeout(_) | Self::Store(StoreError::Unavailable(_))
        )
    }
}

/// Result of an accepted conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub quantity: i64,
    pub version: i64,
}

#[derive(Clone)]
pub struct StockUpdater {
    store: Arc<dyn InventoryStore>,
    timeout: Duration,
}

impl StockUpdater {
    pub fn new(store: Arc<dyn InventoryStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Apply `delta` iff the stored version still equals `expected_version`.
    ///
    /// One conditional write against the store; never retried here. When the
    /// write matches nothing, a separate read classifies the refusal as
    /// `NotFound`, `Conflict` or `InsufficientStock`.
    pub async fn conditional_adjust(
        &self,
        id: Uuid,
        delta: i64,
        expected_version: i64,
    ) -> Result<Adjustment, StockError> {
        let written = self
            .bounded(self.store.compare_and_adjust(id, delta, expected_version))
            .await
            .map_err(|err| {
                warn!(%id, delta, expected_version, error = %err, "Conditional stock write failed");
                err
            })?;

        if let Some(level) = written {
            info!(
                %id,
                delta,
                quantity = level.quantity,
                version = level.version,
                "Stock adjusted"
            );
            return Ok(Adjustment {
                id,
                quantity: level.quantity,
                version: level.version,
            });
        }

        // Versions never go backwards, so an unchanged version here means the
        // write was refused by the stock guard and not by a racing writer.
        let err = match self.bounded(self.store.stock_level(id)).await? {
            None => StockError::NotFound(id),
            Some(level) if level.version != expected_version => StockError::Conflict {
                id,
                expected: expected_version,
                current: level.version,
            },
            Some(level) => StockError::InsufficientStock {
                id,
                available: level.quantity,
                delta,
            },
        };

        match &err {
            StockError::Conflict { current, .. } => {
                warn!(%id, delta, expected_version, current_version = current, "Stale version, write rejected")
            }
            _ => debug!(%id, delta, expected_version, error = %err, "Stock write refused"),
        }
        Err(err)
    }

    /// Current record, as a client reads it before a guarded write.
    pub async fn current(&self, id: Uuid) -> Result<Product, StockError> {
        self.bounded(self.store.fetch(id))
            .await?
            .ok_or(StockError::NotFound(id))
    }

    pub async fn level(&self, id: Uuid) -> Result<StockLevel, StockError> {
        self.bounded(self.store.stock_level(id))
            .await?
            .ok_or(StockError::NotFound(id))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StockError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StockError::Timeout(self.timeout)),
        }
    }
}
