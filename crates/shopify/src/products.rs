//! Admin API operations used by the catalog sync: variant lookup, product
//! creation, price/weight/inventory updates, publishing and image uploads.

use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::client::AdminClient;
use crate::types::{CreatedProduct, ExistingVariant, Location, legacy_id};
use crate::AdminError;

/// Shopify rejects create calls carrying more than this many media entries.
const MAX_CREATE_MEDIA: usize = 10;

impl AdminClient {
    /// First publication id (the Online Store sales channel on a stock shop).
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` when the shop has no publications.
    #[instrument(skip(self))]
    pub async fn first_publication_id(&self) -> Result<String, AdminError> {
        let query = r"
            query {
                publications(first: 1) {
                    nodes { id }
                }
            }
        ";
        let data: Value = self.execute(query, None).await?;
        data.pointer("/publications/nodes/0/id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| AdminError::NotFound("publication".to_string()))
    }

    /// First inventory location, with both its GID (inventory mutations)
    /// and legacy numeric id (REST).
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` when the shop has no locations.
    #[instrument(skip(self))]
    pub async fn primary_location(&self) -> Result<Location, AdminError> {
        let query = r"
            query {
                locations(first: 1) {
                    nodes { id legacyResourceId }
                }
            }
        ";
        let data: Value = self.execute(query, None).await?;
        let node = data
            .pointer("/locations/nodes/0")
            .ok_or_else(|| AdminError::NotFound("location".to_string()))?;
        let gid = node
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| AdminError::NotFound("location id".to_string()))?;
        let id = node
            .get("legacyResourceId")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
            .or_else(|| legacy_id(&gid))
            .ok_or_else(|| AdminError::NotFound("location legacy id".to_string()))?;
        Ok(Location { gid, id })
    }

    /// Look up an existing variant by SKU.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or GraphQL failure. An absent SKU is
    /// `Ok(None)`, not an error.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn find_variant_by_sku(
        &self,
        sku: &str,
    ) -> Result<Option<ExistingVariant>, AdminError> {
        let query = r"
            query($query: String!) {
                productVariants(first: 1, query: $query) {
                    nodes {
                        id
                        product { id }
                        inventoryItem { id }
                    }
                }
            }
        ";
        let variables = json!({ "query": format!("sku:{sku}") });
        let data: Value = self.execute(query, Some(variables)).await?;

        let Some(node) = data.pointer("/productVariants/nodes/0") else {
            return Ok(None);
        };
        let variant_id = node.get("id").and_then(Value::as_str);
        let product_id = node.pointer("/product/id").and_then(Value::as_str);
        let inventory_item_id = node.pointer("/inventoryItem/id").and_then(Value::as_str);
        match (variant_id, product_id, inventory_item_id) {
            (Some(variant_id), Some(product_id), Some(inventory_item_id)) => {
                Ok(Some(ExistingVariant {
                    variant_id: variant_id.to_string(),
                    product_id: product_id.to_string(),
                    inventory_item_id: inventory_item_id.to_string(),
                }))
            }
            _ => Ok(None),
        }
    }

    /// Create a product with its images attached as media. If Shopify
    /// rejects the media payload the create is retried bare, and the
    /// returned flag tells the caller to upload images over REST instead.
    ///
    /// # Errors
    ///
    /// Returns an error when the bare create also fails.
    #[instrument(skip(self, product), fields(sku = %product.sku))]
    pub async fn create_product(
        &self,
        product: &mayoreo_core::NormalizedProduct,
    ) -> Result<CreatedProduct, AdminError> {
        let media: Vec<Value> = product
            .images
            .iter()
            .take(MAX_CREATE_MEDIA)
            .map(|src| {
                json!({ "originalSource": src, "mediaContentType": "IMAGE" })
            })
            .collect();

        if !media.is_empty() {
            match self.product_create(product, Some(&media)).await {
                Ok(created) => return Ok(created),
                Err(err @ (AdminError::GraphQL(_) | AdminError::UserError(_))) => {
                    warn!(sku = %product.sku, error = %err, "create with media rejected, retrying bare");
                }
                Err(err) => return Err(err),
            }
        }

        let mut created = self.product_create(product, None).await?;
        created.created_with_media = false;
        Ok(created)
    }

    async fn product_create(
        &self,
        product: &mayoreo_core::NormalizedProduct,
        media: Option<&[Value]>,
    ) -> Result<CreatedProduct, AdminError> {
        let query = r"
            mutation($product: ProductCreateInput!, $media: [CreateMediaInput!]) {
                productCreate(product: $product, media: $media) {
                    product {
                        id
                        variants(first: 1) {
                            nodes {
                                id
                                inventoryItem { id }
                            }
                        }
                    }
                    userErrors { field message }
                }
            }
        ";
        let variables = json!({
            "product": {
                "title": product.title,
                "descriptionHtml": product.description_html,
                "vendor": product.vendor,
                "productType": product.product_type,
                "status": "ACTIVE",
            },
            "media": media,
        });
        let data: Value = self.execute(query, Some(variables)).await?;
        check_user_errors(&data, "/productCreate/userErrors")?;

        let payload = data
            .pointer("/productCreate/product")
            .ok_or_else(|| AdminError::NotFound("created product".to_string()))?;
        let product_id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AdminError::NotFound("created product id".to_string()))?;
        let variant = payload
            .pointer("/variants/nodes/0")
            .ok_or_else(|| AdminError::NotFound("default variant".to_string()))?;
        let variant_id = variant
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AdminError::NotFound("default variant id".to_string()))?;
        let inventory_item_id = variant
            .pointer("/inventoryItem/id")
            .and_then(Value::as_str)
            .ok_or_else(|| AdminError::NotFound("inventory item id".to_string()))?;

        Ok(CreatedProduct {
            product_id: product_id.to_string(),
            variant_id: variant_id.to_string(),
            inventory_item_id: inventory_item_id.to_string(),
            created_with_media: media.is_some(),
        })
    }

    /// Set the variant's price. Non-positive prices are refused upstream
    /// and skipped here as a second guard.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserError` when the mutation reports one.
    #[instrument(skip(self))]
    pub async fn update_variant_price(
        &self,
        product_id: &str,
        variant_id: &str,
        price: f64,
    ) -> Result<(), AdminError> {
        if price <= 0.0 {
            return Ok(());
        }
        let variant = json!({
            "id": variant_id,
            "price": format!("{price:.2}"),
        });
        self.bulk_update_variant(product_id, variant).await
    }

    /// Set the variant's barcode. Independent of the price write, since
    /// price setting can be toggled off per run while identity fields
    /// always land.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserError` when the mutation reports one.
    #[instrument(skip(self))]
    pub async fn set_variant_barcode(
        &self,
        product_id: &str,
        variant_id: &str,
        barcode: &str,
    ) -> Result<(), AdminError> {
        let variant = json!({ "id": variant_id, "barcode": barcode });
        self.bulk_update_variant(product_id, variant).await
    }

    async fn bulk_update_variant(
        &self,
        product_id: &str,
        variant: Value,
    ) -> Result<(), AdminError> {
        let query = r"
            mutation($productId: ID!, $variants: [ProductVariantsBulkInput!]!) {
                productVariantsBulkUpdate(productId: $productId, variants: $variants) {
                    userErrors { field message }
                }
            }
        ";
        let variables = json!({ "productId": product_id, "variants": [variant] });
        let data: Value = self.execute(query, Some(variables)).await?;
        check_user_errors(&data, "/productVariantsBulkUpdate/userErrors")
    }

    /// Set the variant's shipping weight via REST (grams).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the GID carries no
    /// numeric id.
    #[instrument(skip(self))]
    pub async fn update_variant_weight(
        &self,
        variant_id: &str,
        weight_kg: f64,
    ) -> Result<(), AdminError> {
        let id = legacy_id(variant_id)
            .ok_or_else(|| AdminError::NotFound(format!("numeric id in {variant_id}")))?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let grams = (weight_kg.max(0.0) * 1000.0).round() as u64;
        let body = json!({ "variant": { "id": id, "grams": grams } });
        self.rest_put(&format!("/variants/{id}.json"), &body).await?;
        Ok(())
    }

    /// Stamp the distributor SKU on the inventory item and enable tracking.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserError` when the mutation reports one.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn set_inventory_sku(
        &self,
        inventory_item_id: &str,
        sku: &str,
    ) -> Result<(), AdminError> {
        let query = r"
            mutation($id: ID!, $input: InventoryItemInput!) {
                inventoryItemUpdate(id: $id, input: $input) {
                    userErrors { field message }
                }
            }
        ";
        let variables = json!({
            "id": inventory_item_id,
            "input": { "sku": sku, "tracked": true },
        });
        let data: Value = self.execute(query, Some(variables)).await?;
        check_user_errors(&data, "/inventoryItemUpdate/userErrors")
    }

    /// Record the procurement cost on the inventory item.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserError` when the mutation reports one.
    #[instrument(skip(self))]
    pub async fn update_inventory_cost(
        &self,
        inventory_item_id: &str,
        cost: f64,
    ) -> Result<(), AdminError> {
        let query = r"
            mutation($id: ID!, $input: InventoryItemInput!) {
                inventoryItemUpdate(id: $id, input: $input) {
                    userErrors { field message }
                }
            }
        ";
        let variables = json!({
            "id": inventory_item_id,
            "input": { "cost": format!("{cost:.2}") },
        });
        let data: Value = self.execute(query, Some(variables)).await?;
        check_user_errors(&data, "/inventoryItemUpdate/userErrors")
    }

    /// Current available quantity of an inventory item at a location.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or GraphQL failure. An item with no
    /// level at the location reads as zero.
    #[instrument(skip(self))]
    pub async fn available_quantity(
        &self,
        inventory_item_id: &str,
        location_id: &str,
    ) -> Result<i64, AdminError> {
        let query = r#"
            query($id: ID!, $locationId: ID!) {
                inventoryItem(id: $id) {
                    inventoryLevel(locationId: $locationId) {
                        quantities(names: ["available"]) {
                            name
                            quantity
                        }
                    }
                }
            }
        "#;
        let variables = json!({ "id": inventory_item_id, "locationId": location_id });
        let data: Value = self.execute(query, Some(variables)).await?;
        Ok(data
            .pointer("/inventoryItem/inventoryLevel/quantities/0/quantity")
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Move the available quantity to `target` by adjusting the delta.
    /// Returns whether an adjustment was issued; a zero delta is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserError` when the mutation reports one.
    #[instrument(skip(self))]
    pub async fn adjust_inventory_to_target(
        &self,
        inventory_item_id: &str,
        location_id: &str,
        target: i64,
    ) -> Result<bool, AdminError> {
        let current = self.available_quantity(inventory_item_id, location_id).await?;
        let delta = target - current;
        if delta == 0 {
            return Ok(false);
        }

        let query = r"
            mutation($input: InventoryAdjustQuantitiesInput!) {
                inventoryAdjustQuantities(input: $input) {
                    userErrors { field message }
                }
            }
        ";
        let variables = json!({
            "input": {
                "reason": "correction",
                "name": "available",
                "changes": [{
                    "delta": delta,
                    "inventoryItemId": inventory_item_id,
                    "locationId": location_id,
                }],
            },
        });
        let data: Value = self.execute(query, Some(variables)).await?;
        check_user_errors(&data, "/inventoryAdjustQuantities/userErrors")?;
        Ok(true)
    }

    /// Publish a product to a sales channel.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserError` when the mutation reports one.
    #[instrument(skip(self))]
    pub async fn publish(
        &self,
        product_id: &str,
        publication_id: &str,
    ) -> Result<(), AdminError> {
        let query = r"
            mutation($id: ID!, $input: [PublicationInput!]!) {
                publishablePublish(id: $id, input: $input) {
                    userErrors { field message }
                }
            }
        ";
        let variables = json!({
            "id": product_id,
            "input": [{ "publicationId": publication_id }],
        });
        let data: Value = self.execute(query, Some(variables)).await?;
        check_user_errors(&data, "/publishablePublish/userErrors")
    }

    /// How many images a product already has (REST).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the GID carries no
    /// numeric id.
    #[instrument(skip(self))]
    pub async fn product_image_count(&self, product_id: &str) -> Result<usize, AdminError> {
        let id = legacy_id(product_id)
            .ok_or_else(|| AdminError::NotFound(format!("numeric id in {product_id}")))?;
        let body = self.rest_get(&format!("/products/{id}/images.json")).await?;
        Ok(body
            .get("images")
            .and_then(Value::as_array)
            .map_or(0, Vec::len))
    }

    /// Attach one image to a product by source URL (REST).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the GID carries no
    /// numeric id.
    #[instrument(skip(self))]
    pub async fn add_product_image(&self, product_id: &str, src: &str) -> Result<(), AdminError> {
        let id = legacy_id(product_id)
            .ok_or_else(|| AdminError::NotFound(format!("numeric id in {product_id}")))?;
        let body = json!({ "image": { "src": src } });
        self.rest_post(&format!("/products/{id}/images.json"), &body).await?;
        Ok(())
    }
}

/// Fail on non-empty `userErrors` in a mutation payload.
fn check_user_errors(data: &Value, pointer: &str) -> Result<(), AdminError> {
    let messages: Vec<String> = data
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(AdminError::UserError(messages.join("; ")))
    }
}
