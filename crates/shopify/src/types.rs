//! Identifier bundles returned by the Admin API operations.

/// An existing variant matched by SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingVariant {
    /// Variant GID (`gid://shopify/ProductVariant/...`).
    pub variant_id: String,
    /// Owning product GID.
    pub product_id: String,
    /// Inventory item GID.
    pub inventory_item_id: String,
}

/// Identifiers of a freshly created product and its default variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProduct {
    /// Product GID.
    pub product_id: String,
    /// Default variant GID.
    pub variant_id: String,
    /// Inventory item GID of the default variant.
    pub inventory_item_id: String,
    /// Whether media made it into the create call. When Shopify rejects the
    /// media payload the product is created bare and images are uploaded
    /// one by one over REST afterwards.
    pub created_with_media: bool,
}

/// An inventory location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Location GID, as required by inventory mutations.
    pub gid: String,
    /// Numeric legacy id, as required by REST resources.
    pub id: u64,
}

/// Trailing numeric id of a GID (`gid://shopify/Product/123` → `123`).
#[must_use]
pub fn legacy_id(gid: &str) -> Option<u64> {
    gid.rsplit('/').next().and_then(|tail| tail.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_id_from_gid() {
        assert_eq!(legacy_id("gid://shopify/Product/123456"), Some(123_456));
        assert_eq!(legacy_id("gid://shopify/ProductVariant/9"), Some(9));
        assert_eq!(legacy_id("gid://shopify/Product/not-a-number"), None);
    }
}
