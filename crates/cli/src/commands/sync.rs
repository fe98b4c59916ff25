//! The catalog sync run.
//!
//! Walks the distributor listing page by page, normalizes each record and
//! upserts it into the storefront. Precheck failures (credentials,
//! publication, location) are fatal; everything per-record is caught,
//! logged with the record id and counted, and the run keeps going.

use std::time::Duration;

use mayoreo_core::currency::ExchangeContext;
use mayoreo_core::product::map_product;
use mayoreo_core::NormalizedProduct;
use mayoreo_shopify::{AdminClient, AdminError, Location};
use mayoreo_syscom::discovery::ImageDiscovery;
use mayoreo_syscom::{SyscomClient, summary_product_id};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{CatalogMode, SyncConfig};

/// Pause between individual image uploads, to stay under the REST bucket.
const IMAGE_UPLOAD_PAUSE: Duration = Duration::from_millis(400);

/// What happened to one record.
enum RowOutcome {
    Created,
    Updated,
}

/// Run the full sync.
///
/// # Errors
///
/// Returns an error only for fatal precheck failures; per-record errors
/// are counted and logged instead.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::from_env()?;

    let syscom = SyscomClient::new(&config.syscom);
    let admin = AdminClient::new(&config.shopify);
    let discovery = ImageDiscovery::new(config.images.clone());

    syscom.authenticate().await?;
    let publication_id = admin.first_publication_id().await?;
    let location = admin.primary_location().await?;

    let rate = match syscom.exchange_rate().await {
        Ok(rate) => rate,
        Err(err) => {
            warn!(error = %err, fallback = config.run.rate_fallback, "exchange rate unavailable, using fallback");
            config.run.rate_fallback
        }
    };
    let exchange = ExchangeContext {
        settlement_currency: config.run.currency.clone(),
        rate,
        fallback_rate: config.run.rate_fallback,
    };
    info!(rate, currency = %config.run.currency, "exchange context for the run");

    let mut created = 0u32;
    let mut updated = 0u32;
    let mut errors = 0u32;

    for page in 1..=config.run.pages {
        let rows = match config.run.mode {
            CatalogMode::Search => {
                syscom
                    .search_products(&config.run.query, page, config.run.only_stock)
                    .await?
            }
            CatalogMode::Brand => {
                syscom
                    .brand_products(&config.run.query, page, config.run.only_stock)
                    .await?
            }
        };
        if rows.is_empty() {
            debug!(page, "empty page, stopping pagination");
            break;
        }
        info!(page, rows = rows.len(), "page fetched");

        for row in &rows {
            let Some(id) = summary_product_id(row) else {
                debug!("row carries no product id, skipping");
                continue;
            };

            match sync_row(&syscom, &admin, &discovery, &exchange, &config, &location, &publication_id, &id)
                .await
            {
                Ok(Some(RowOutcome::Created)) => {
                    created += 1;
                    info!(product_id = %id, "product created");
                }
                Ok(Some(RowOutcome::Updated)) => {
                    updated += 1;
                    info!(product_id = %id, "product updated");
                }
                Ok(None) => {}
                Err(err) => {
                    errors += 1;
                    error!(product_id = %id, error = %err, "record failed");
                }
            }

            sleep(Duration::from_millis(config.run.sleep_ms)).await;
        }
    }

    info!(created, updated, errors, "sync complete");
    Ok(())
}

/// Detail fetch, image pipeline, mapping and upsert for one record.
/// `Ok(None)` means the record was skipped (no identity, no usable price).
#[allow(clippy::too_many_arguments)]
async fn sync_row(
    syscom: &SyscomClient,
    admin: &AdminClient,
    discovery: &ImageDiscovery,
    exchange: &ExchangeContext,
    config: &SyncConfig,
    location: &Location,
    publication_id: &str,
    id: &str,
) -> Result<Option<RowOutcome>, Box<dyn std::error::Error>> {
    let record = syscom.product_detail(id).await?;
    let images = discovery.discover_images(&record).await;

    let product = match map_product(&record, exchange, &config.pricing, images) {
        Ok(product) => product,
        Err(reason) => {
            debug!(product_id = %id, ?reason, "record skipped");
            return Ok(None);
        }
    };

    let outcome = upsert(admin, location, publication_id, &product, config.run.set_price).await?;
    Ok(Some(outcome))
}

async fn upsert(
    admin: &AdminClient,
    location: &Location,
    publication_id: &str,
    product: &NormalizedProduct,
    set_price: bool,
) -> Result<RowOutcome, AdminError> {
    if let Some(existing) = admin.find_variant_by_sku(&product.sku).await? {
        apply_product_state(
            admin,
            location,
            publication_id,
            product,
            &existing.product_id,
            &existing.variant_id,
            &existing.inventory_item_id,
            set_price,
        )
        .await?;
        append_missing_images(admin, &existing.product_id, &product.images).await?;
        Ok(RowOutcome::Updated)
    } else {
        let created = admin.create_product(product).await?;
        apply_product_state(
            admin,
            location,
            publication_id,
            product,
            &created.product_id,
            &created.variant_id,
            &created.inventory_item_id,
            set_price,
        )
        .await?;
        if !created.created_with_media {
            upload_images(admin, &created.product_id, &product.images).await;
        }
        Ok(RowOutcome::Created)
    }
}

/// The mutations shared by the create and update paths: price, weight,
/// SKU/tracking, cost, inventory level and publication.
#[allow(clippy::too_many_arguments)]
async fn apply_product_state(
    admin: &AdminClient,
    location: &Location,
    publication_id: &str,
    product: &NormalizedProduct,
    product_id: &str,
    variant_id: &str,
    inventory_item_id: &str,
    set_price: bool,
) -> Result<(), AdminError> {
    if set_price {
        admin
            .update_variant_price(product_id, variant_id, product.price)
            .await?;
    }
    // Identity fields land regardless of the price toggle.
    if let Some(barcode) = product.barcode.as_deref() {
        admin.set_variant_barcode(product_id, variant_id, barcode).await?;
    }
    if product.weight_kg > 0.0 {
        admin.update_variant_weight(variant_id, product.weight_kg).await?;
    }
    admin.set_inventory_sku(inventory_item_id, &product.sku).await?;
    admin.update_inventory_cost(inventory_item_id, product.cost).await?;
    admin
        .adjust_inventory_to_target(inventory_item_id, &location.gid, product.available)
        .await?;
    admin.publish(product_id, publication_id).await?;
    Ok(())
}

/// Upload only the images the product does not already have, assuming the
/// existing ones are the head of our candidate list.
async fn append_missing_images(
    admin: &AdminClient,
    product_id: &str,
    images: &[String],
) -> Result<(), AdminError> {
    let existing = admin.product_image_count(product_id).await?;
    if existing >= images.len() {
        return Ok(());
    }
    upload_images(admin, product_id, &images[existing..]).await;
    Ok(())
}

/// Best-effort: many candidates are speculative sibling URLs, so a failed
/// upload is logged and the rest still go through.
async fn upload_images(admin: &AdminClient, product_id: &str, images: &[String]) {
    for src in images {
        if let Err(err) = admin.add_product_image(product_id, src).await {
            warn!(product_id = %product_id, image = %src, error = %err, "image upload failed");
        }
        sleep(IMAGE_UPLOAD_PAUSE).await;
    }
}
