use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InventoryStore, StoreError, StoreResult};
use crate::models::{NewProduct, Page, Product, StockLevel, INITIAL_VERSION};

/// Artificial latency around the conditional write, used to simulate a slow
/// round trip. `before` elapses before the write is applied, `after` once it
/// has been applied but before the caller hears about it.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteLatency {
    pub before: Duration,
    pub after: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<Uuid, Product>,
    /// Insertion order, for stable paging.
    order: Vec<Uuid>,
    skus: HashSet<String>,
}

/// In-process store. Every stock mutation happens while holding the write
/// guard with no `.await` between compare and write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    latency: WriteLatency,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_latency(mut self, latency: WriteLatency) -> Self {
        self.latency = latency;
        self
    }

    fn build(product: &NewProduct) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: product.sku.trim().to_string(),
            name: product.name.trim().to_string(),
            ncm: product.ncm.clone(),
            price_cents: product.price_cents,
            quantity: product.quantity,
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    async fn pause(duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

impl Inner {
    fn push(&mut self, product: Product) {
        self.skus.insert(product.sku.clone());
        self.order.push(product.id);
        self.records.insert(product.id, product);
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert(&self, product: &NewProduct) -> StoreResult<Product> {
        let record = Self::build(product);
        let mut inner = self.inner.write().await;
        if inner.skus.contains(&record.sku) {
            return Err(StoreError::Duplicate(format!("sku {} already exists", record.sku)));
        }
        inner.push(record.clone());
        Ok(record)
    }

    async fn insert_batch(&self, products: &[NewProduct]) -> StoreResult<Vec<Product>> {
        let mut inner = self.inner.write().await;
        let mut inserted = Vec::with_capacity(products.len());
        for p in products {
            let record = Self::build(p);
            if inner.skus.contains(&record.sku) {
                continue;
            }
            inner.push(record.clone());
            inserted.push(record);
        }
        Ok(inserted)
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn list(&self, page: Page) -> StoreResult<Vec<Product>> {
        let inner = self.inner.read().await;
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        Ok(inner
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| inner.records.get(id).cloned())
            .collect())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.inner.read().await.records.len() as i64)
    }

    async fn stock_level(&self, id: Uuid) -> StoreResult<Option<StockLevel>> {
        Ok(self
            .inner
            .read()
            .await
            .records
            .get(&id)
            .map(Product::stock_level))
    }

    async fn compare_and_adjust(
        &self,
        id: Uuid,
        delta: i64,
        expected_version: i64,
    ) -> StoreResult<Option<StockLevel>> {
        Self::pause(self.latency.before).await;

        let applied = {
            let mut inner = self.inner.write().await;
            match inner.records.get_mut(&id) {
                Some(record) if record.version == expected_version => {
                    let quantity = record.quantity.checked_add(delta).ok_or_else(|| {
                        StoreError::Overflow(format!("quantity {} + {}", record.quantity, delta))
                    })?;
                    if quantity < 0 {
                        None
                    } else {
                        record.quantity = quantity;
                        record.version += 1;
                        record.updated_at = Utc::now();
                        Some(record.stock_level())
                    }
                }
                _ => None,
            }
        };

        Self::pause(self.latency.after).await;
        Ok(applied)
    }

    async fn overwrite_quantity(&self, id: Uuid, quantity: i64) -> StoreResult<Option<StockLevel>> {
        let mut inner = self.inner.write().await;
        Ok(inner.records.get_mut(&id).map(|record| {
            record.quantity = quantity;
            record.version += 1;
            record.updated_at = Utc::now();
            record.stock_level()
        }))
    }
}
