use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use super::StockError;
use crate::db::{InventoryStore, StoreError};
use crate::models::StockLevel;

/// Read, wait, write back `read + delta` with no version check.
///
/// Two callers that read the same quantity both "succeed" and the later write
/// erases the earlier delta. Kept to demonstrate the lost update that
/// [`super::StockUpdater`] prevents.
#[derive(Clone)]
pub struct UnguardedAdjuster {
    store: Arc<dyn InventoryStore>,
    delay: Duration,
}

impl UnguardedAdjuster {
    pub fn new(store: Arc<dyn InventoryStore>, delay: Duration) -> Self {
        Self { store, delay }
    }

    pub async fn adjust(&self, id: Uuid, delta: i64) -> Result<StockLevel, StockError> {
        let read = self
            .store
            .stock_level(id)
            .await?
            .ok_or(StockError::NotFound(id))?;

        // widens the race window
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let computed = read.quantity.checked_add(delta).ok_or_else(|| {
            StoreError::Overflow(format!("quantity {} + {}", read.quantity, delta))
        })?;

        let written = self
            .store
            .overwrite_quantity(id, computed)
            .await?
            .ok_or(StockError::NotFound(id))?;

        debug!(
            %id,
            delta,
            read_quantity = read.quantity,
            written_quantity = written.quantity,
            "Unguarded stock overwrite"
        );
        Ok(written)
    }
}
