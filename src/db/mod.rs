//! Record store behind the stock endpoints.
//!
//! `compare_and_adjust` is the only primitive that carries concurrency
//! semantics: the compare and the write happen inside the store as one
//! indivisible step. Everything else is plain CRUD.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewProduct, Page, Product, StockLevel};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Connection-level failure; whether a write applied is unknown.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert(&self, product: &NewProduct) -> StoreResult<Product>;

    /// Bulk insert; rows whose SKU already exists are skipped.
    async fn insert_batch(&self, products: &[NewProduct]) -> StoreResult<Vec<Product>>;

    async fn fetch(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Records in creation order.
    async fn list(&self, page: Page) -> StoreResult<Vec<Product>>;

    async fn count(&self) -> StoreResult<i64>;

    async fn stock_level(&self, id: Uuid) -> StoreResult<Option<StockLevel>>;

    /// `quantity += delta, version += 1` iff the stored version equals
    /// `expected_version` and the result stays non-negative.
    ///
    /// Returns the new level on success and `None` when the predicate matched
    /// zero rows (stale version, unknown id, or insufficient stock; the
    /// caller tells them apart with a follow-up read).
    async fn compare_and_adjust(
        &self,
        id: Uuid,
        delta: i64,
        expected_version: i64,
    ) -> StoreResult<Option<StockLevel>>;

    /// Unconditional last-writer-wins overwrite of `quantity` (still bumps
    /// `version`). Only the unguarded endpoint uses it.
    async fn overwrite_quantity(&self, id: Uuid, quantity: i64) -> StoreResult<Option<StockLevel>>;
}
