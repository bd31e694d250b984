use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::db::{InventoryStore, StoreResult};
use crate::models::{NewProduct, Product};

static ADJECTIVES: &[&str] = &[
    "Premium", "Deluxe", "Ultra", "Pro", "Classic", "Elite", "Smart", "Eco",
    "Compact", "Portable", "Heavy-Duty", "Lightweight", "Advanced", "Basic",
    "Professional", "Essential", "Signature", "Exclusive", "Standard", "Plus",
];

static NOUNS: &[&str] = &[
    "Widget", "Gadget", "Device", "Module", "Unit", "Component", "System",
    "Kit", "Set", "Pack", "Bundle", "Assembly", "Console", "Panel", "Sensor",
    "Controller", "Adapter", "Monitor", "Processor", "Scanner",
];

const BATCH_SIZE: usize = 500;

/// Number of fixed products in the demo catalogue.
pub const DEMO_CATALOG_SIZE: usize = 10;

/// The fixed ten-product catalogue the exercises refer to.
pub fn demo_catalog() -> Vec<NewProduct> {
    (1..=DEMO_CATALOG_SIZE as i64)
        .map(|i| NewProduct {
            sku: format!("PROD-{:04}", i),
            name: format!("Produto Fiscal {}", i),
            ncm: format!("{}", 10_000_000 + i),
            // 50.00 + i * 12.50
            price_cents: 5_000 + i * 1_250,
            quantity: 100 + i * 10,
        })
        .collect()
}

/// Insert the demo catalogue when the store is empty. Returns how many rows were added.
pub async fn seed_demo_catalog(store: &dyn InventoryStore) -> StoreResult<usize> {
    if store.count().await? > 0 {
        info!("Store already populated, skipping demo catalogue.");
        return Ok(0);
    }
    let inserted = store.insert_batch(&demo_catalog()).await?;
    info!(count = inserted.len(), "Seeded demo catalogue");
    Ok(inserted.len())
}

/// Generate a random product name using adjective + noun + serial suffix.
fn random_product(rng: &mut impl Rng, serial: usize) -> NewProduct {
    let adj = ADJECTIVES.choose(rng).unwrap_or(&"Standard");
    let noun = NOUNS.choose(rng).unwrap_or(&"Widget");
    NewProduct {
        sku: format!("SKU-{:05}-{:04X}", serial, rng.gen::<u16>()),
        name: format!("{} {} #{:05}", adj, noun, serial),
        ncm: format!("{:08}", rng.gen_range(0..100_000_000u32)),
        price_cents: rng.gen_range(99..=999_99), // $0.99 – $999.99
        quantity: rng.gen_range(0..=500),
    }
}

/// Seed the store with `count` random products in batches.
///
/// Serials continue from the current row count, so repeated calls do not
/// regenerate the same SKU prefixes. SKUs the store already holds are skipped
/// and reported in the log.
pub async fn seed_products(store: &dyn InventoryStore, count: usize) -> StoreResult<Vec<Product>> {
    info!("Seeding {} products...", count);

    // StdRng is Send, so it can be held across await points
    let mut rng = StdRng::from_entropy();
    let mut all_products: Vec<Product> = Vec::with_capacity(count);

    let first_serial = usize::try_from(store.count().await?).unwrap_or(0);
    let chunks = count.div_ceil(BATCH_SIZE);

    for chunk in 0..chunks {
        let start = chunk * BATCH_SIZE;
        let end = (start + BATCH_SIZE).min(count);

        let batch: Vec<NewProduct> = (start..end)
            .map(|offset| random_product(&mut rng, first_serial + offset))
            .collect();

        let inserted = store.insert_batch(&batch).await?;
        if inserted.len() < batch.len() {
            warn!(
                skipped = batch.len() - inserted.len(),
                "Skipped products whose SKU already exists"
            );
        }
        all_products.extend(inserted);

        info!("  Seeded batch {}/{} ({} products so far)", chunk + 1, chunks, all_products.len());
    }

    info!("Seeding complete. Total: {} products", all_products.len());
    Ok(all_products)
}
