use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inventory record. `quantity` and `version` are only ever written through the
/// store's stock primitives; everything else is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    /// Mercosur tariff classification, eight digits.
    pub ncm: String,
    /// Price stored as integer cents (e.g. 999 = $9.99)
    pub price_cents: i64,
    pub quantity: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel {
            quantity: self.quantity,
            version: self.version,
        }
    }
}

/// The (quantity, version) pair guarded by optimistic concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockLevel {
    pub quantity: i64,
    pub version: i64,
}

/// Version every record starts at.
pub const INITIAL_VERSION: i64 = 1;

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub ncm: String,
    /// Price in cents
    pub price_cents: i64,
    #[serde(default)]
    pub quantity: i64,
}

impl NewProduct {
    /// Field-level checks; returns a message suitable for a 400 response.
    pub fn validate(&self) -> Result<(), String> {
        let sku = self.sku.trim();
        if sku.is_empty() || sku.chars().count() > 20 {
            return Err("sku must be between 1 and 20 characters".to_string());
        }
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 200 {
            return Err("name must be between 1 and 200 characters".to_string());
        }
        if self.ncm.len() != 8 || !self.ncm.bytes().all(|b| b.is_ascii_digit()) {
            return Err("ncm must be exactly 8 digits".to_string());
        }
        if self.price_cents <= 0 {
            return Err("price_cents must be > 0".to_string());
        }
        if self.quantity < 0 {
            return Err("quantity must be >= 0".to_string());
        }
        Ok(())
    }
}

// ── Query parameters ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A clamped limit/offset window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;
}

impl From<&PageParams> for Page {
    fn from(params: &PageParams) -> Self {
        Self {
            limit: params
                .limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: params.offset.unwrap_or(0).max(0),
        }
    }
}

/// `?delta=` for the unguarded endpoint.
#[derive(Debug, Deserialize)]
pub struct UnguardedAdjustParams {
    pub delta: i64,
}

/// `?delta=&version=` for the guarded endpoint.
#[derive(Debug, Deserialize)]
pub struct GuardedAdjustParams {
    pub delta: i64,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            sku: "PROD-0001".to_string(),
            name: "Produto Fiscal 1".to_string(),
            ncm: "10000001".to_string(),
            price_cents: 6250,
            quantity: 110,
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(new_product().validate().is_ok());
    }

    #[test]
    fn rejects_blank_or_long_sku() {
        let mut p = new_product();
        p.sku = "   ".to_string();
        assert!(p.validate().is_err());
        p.sku = "X".repeat(21);
        assert!(p.validate().is_err());
    }

    #[test]
    fn ncm_must_be_eight_digits() {
        for bad in ["", "1234567", "123456789", "1234567A", "1234 567"] {
            let mut p = new_product();
            p.ncm = bad.to_string();
            assert!(p.validate().unwrap_err().contains("ncm"), "{bad:?}");
        }
    }

    #[test]
    fn rejects_non_positive_price_and_negative_quantity() {
        let mut p = new_product();
        p.price_cents = 0;
        assert!(p.validate().unwrap_err().contains("price_cents"));

        let mut p = new_product();
        p.quantity = -1;
        assert!(p.validate().unwrap_err().contains("quantity"));
    }

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::from(&PageParams::default()), Page { limit: 20, offset: 0 });

        let page = Page::from(&PageParams { limit: Some(500), offset: Some(-3) });
        assert_eq!(page, Page { limit: 100, offset: 0 });

        let page = Page::from(&PageParams { limit: Some(0), offset: Some(40) });
        assert_eq!(page, Page { limit: 1, offset: 40 });
    }

    #[test]
    fn stock_level_mirrors_record() {
        let now = Utc::now();
        let p = Product {
            id: Uuid::new_v4(),
            sku: "A".to_string(),
            name: "A".to_string(),
            ncm: "00000000".to_string(),
            price_cents: 1,
            quantity: 7,
            version: 3,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(p.stock_level(), StockLevel { quantity: 7, version: 3 });
    }
}
