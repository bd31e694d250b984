use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{InventoryStore, StoreError, StoreResult};
use crate::models::{NewProduct, Page, Product, StockLevel};

const PRODUCT_COLUMNS: &str =
    "id, sku, name, ncm, price_cents, quantity, version, created_at, updated_at";

/// SQLSTATE `numeric_value_out_of_range` (e.g. `bigint out of range`).
const NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::Duplicate(db.message().to_string());
            }
            if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) {
                return Self::Overflow(db.message().to_string());
            }
        }
        if matches!(
            err,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        ) {
            return Self::Unavailable(err.to_string());
        }
        Self::Database(err)
    }
}

/// PostgreSQL-backed store. The conditional write is a single
/// `UPDATE ... WHERE id = $ AND version = $ RETURNING`, so the row lock taken
/// by the engine serializes racing writers.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Database connection pool established.");
        Ok(Self::new(pool))
    }

    /// Run pending migrations from `./migrations`.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations complete.");
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn insert(&self, product: &NewProduct) -> StoreResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (sku, name, ncm, price_cents, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(&product.ncm)
        .bind(product.price_cents)
        .bind(product.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    async fn insert_batch(&self, products: &[NewProduct]) -> StoreResult<Vec<Product>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let mut skus: Vec<String> = Vec::with_capacity(products.len());
        let mut names: Vec<String> = Vec::with_capacity(products.len());
        let mut ncms: Vec<String> = Vec::with_capacity(products.len());
        let mut prices: Vec<i64> = Vec::with_capacity(products.len());
        let mut quantities: Vec<i64> = Vec::with_capacity(products.len());
        for p in products {
            skus.push(p.sku.trim().to_string());
            names.push(p.name.trim().to_string());
            ncms.push(p.ncm.clone());
            prices.push(p.price_cents);
            quantities.push(p.quantity);
        }

        // unnest keeps a whole batch in one round trip
        let inserted = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (sku, name, ncm, price_cents, quantity)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::bigint[], $5::bigint[])
            ON CONFLICT (sku) DO NOTHING
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&skus)
        .bind(&names)
        .bind(&ncms)
        .bind(&prices)
        .bind(&quantities)
        .fetch_all(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list(&self, page: Page) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn count(&self) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn stock_level(&self, id: Uuid) -> StoreResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(
            "SELECT quantity, version FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }

    async fn compare_and_adjust(
        &self,
        id: Uuid,
        delta: i64,
        expected_version: i64,
    ) -> StoreResult<Option<StockLevel>> {
        // The stock guard is evaluated in NUMERIC so it can never raise
        // `bigint out of range` ahead of the version check; only the SET on
        // a matching row can overflow, and that maps to `Overflow`.
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE products
            SET quantity   = quantity + $1,
                version    = version + 1,
                updated_at = NOW()
            WHERE id = $2
              AND version = $3
              AND quantity::numeric + $1::numeric >= 0
            RETURNING quantity, version
            "#,
        )
        .bind(delta)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }

    async fn overwrite_quantity(&self, id: Uuid, quantity: i64) -> StoreResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            UPDATE products
            SET quantity   = $1,
                version    = version + 1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING quantity, version
            "#,
        )
        .bind(quantity)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    #[derive(Debug)]
    struct EngineError {
        code: &'static str,
        unique: bool,
        message: &'static str,
    }

    impl fmt::Display for EngineError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl StdError for EngineError {}

    impl DatabaseError for EngineError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    fn engine(code: &'static str, unique: bool, message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(EngineError { code, unique, message }))
    }

    #[test]
    fn bigint_out_of_range_is_overflow_not_a_database_error() {
        let err = StoreError::from(engine(NUMERIC_OUT_OF_RANGE, false, "bigint out of range"));
        assert!(matches!(err, StoreError::Overflow(ref msg) if msg == "bigint out of range"), "got {err:?}");
    }

    #[test]
    fn unique_violation_is_duplicate() {
        let err = StoreError::from(engine("23505", true, "duplicate key"));
        assert!(matches!(err, StoreError::Duplicate(_)), "got {err:?}");
    }

    #[test]
    fn pool_exhaustion_is_unavailable_and_the_rest_is_database() {
        assert!(matches!(StoreError::from(sqlx::Error::PoolTimedOut), StoreError::Unavailable(_)));
        assert!(matches!(
            StoreError::from(engine("42P01", false, "relation does not exist")),
            StoreError::Database(_)
        ));
    }
}
