//! Composition of the pricing and image pipelines into a normalized,
//! storefront-ready product record.
//!
//! Field extraction is best-effort over a fixed list of known vendor field
//! name variants; the vendor schema is empirically inconsistent across
//! records, so nothing here assumes a fixed shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PricingConfig;
use crate::currency::ExchangeContext;
use crate::money::{parse_money, round2};
use crate::pricing::{compute_sale_price, select_price};

/// Raw weights above this are assumed to be grams misfiled under a
/// kilogram field name.
const GRAMS_THRESHOLD: f64 = 100.0;

/// A vendor record normalized for storefront upsert.
///
/// `price` is derived solely from `cost`, the margin band and the tax
/// multiplier; it is never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    /// Distributor SKU, non-empty.
    pub sku: String,
    /// Product title, non-empty.
    pub title: String,
    /// HTML description (may be empty).
    pub description_html: String,
    /// Brand / manufacturer name.
    pub vendor: String,
    /// Primary category name.
    pub product_type: String,
    /// Procurement cost in the settlement currency, rounded to 2 decimals.
    pub cost: f64,
    /// Customer-facing sale price, rounded to 2 decimals.
    pub price: f64,
    /// Stock quantity, never negative.
    pub available: i64,
    /// Shipping weight in kilograms.
    pub weight_kg: f64,
    /// Barcode (EAN/GTIN/UPC), when the record carries one.
    pub barcode: Option<String>,
    /// Deduplicated image URLs, cover first.
    pub images: Vec<String>,
}

/// Why a record was skipped rather than mapped. Skips are silent: they are
/// logged at debug level by the sync loop and not counted as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No usable SKU or title field.
    MissingIdentity,
    /// No price candidate cleared the minimum threshold.
    Unpriced,
}

/// Map a raw vendor record into a [`NormalizedProduct`].
///
/// # Errors
///
/// Returns [`SkipReason::MissingIdentity`] when neither a SKU-like nor a
/// title-like field is present, and [`SkipReason::Unpriced`] when no price
/// candidate yields a positive settlement-currency cost.
pub fn map_product(
    record: &Value,
    exchange: &ExchangeContext,
    pricing: &PricingConfig,
    images: Vec<String>,
) -> Result<NormalizedProduct, SkipReason> {
    let sku = first_text(record, &["sku", "codigo", "clave", "modelo"])
        .ok_or(SkipReason::MissingIdentity)?;
    let title = first_text(
        record,
        &["nombre", "titulo", "descripcion_corta", "descripcion"],
    )
    .ok_or(SkipReason::MissingIdentity)?;

    let description_html =
        first_text(record, &["descripcion_html", "descripcion"]).unwrap_or_default();
    let vendor = vendor_name(record).unwrap_or_default();
    let product_type = category_name(record).unwrap_or_default();

    let base = base_price(record, pricing).ok_or(SkipReason::Unpriced)?;
    let currency = source_currency(record);
    let cost = exchange.to_settlement(base, currency.as_deref());
    if cost <= 0.0 {
        return Err(SkipReason::Unpriced);
    }
    let price = compute_sale_price(cost, pricing, &sku);

    let available = first_money(record, &["existencia", "stock", "total_existencia"])
        .map_or(0, |quantity| {
            #[allow(clippy::cast_possible_truncation)] // stock counts are small integers
            let quantity = quantity as i64;
            quantity.max(0)
        });

    let weight_kg = first_money(record, &["peso_kg", "peso"]).map_or(0.0, |raw| {
        if raw > GRAMS_THRESHOLD { raw / 1000.0 } else { raw }
    });

    let barcode = first_text(
        record,
        &[
            "codigo_barras",
            "codigo_barras_ean",
            "ean",
            "barcode",
            "gtin",
            "upc",
        ],
    );

    Ok(NormalizedProduct {
        sku,
        title,
        description_html,
        vendor,
        product_type,
        cost: round2(cost),
        price,
        available,
        weight_kg,
        barcode,
        images,
    })
}

/// Brand name from `marca` (object with `nombre`, or plain string) or
/// `fabricante`. Exposed for the asset-directory discovery stage, which
/// derives `{BRAND}/{SKU}` directory URLs.
#[must_use]
pub fn vendor_name(record: &Value) -> Option<String> {
    if let Some(marca) = record.get("marca") {
        if let Some(name) = marca.get("nombre").and_then(Value::as_str) {
            return non_empty(name);
        }
        if let Some(name) = marca.as_str() {
            return non_empty(name);
        }
    }
    record
        .get("fabricante")
        .and_then(Value::as_str)
        .and_then(non_empty)
}

/// First present field rendered as text: non-empty strings, or numbers.
#[must_use]
pub fn first_text(record: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match record.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn first_money(record: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(parse_money))
}

fn category_name(record: &Value) -> Option<String> {
    if let Some(first) = record
        .get("categorias")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    {
        if let Some(name) = first.get("nombre").and_then(Value::as_str) {
            return non_empty(name);
        }
        if let Some(name) = first.as_str() {
            return non_empty(name);
        }
    }
    if let Some(categoria) = record.get("categoria") {
        if let Some(name) = categoria.get("nombre").and_then(Value::as_str) {
            return non_empty(name);
        }
        if let Some(name) = categoria.as_str() {
            return non_empty(name);
        }
    }
    None
}

/// Selected cost from the price map, falling back to top-level price
/// fields (threshold-free) when the map yields nothing.
fn base_price(record: &Value, pricing: &PricingConfig) -> Option<f64> {
    if let Some(prices) = record.get("precios").and_then(Value::as_object)
        && let Some(candidate) = select_price(prices, &pricing.preference_order, pricing.min_price)
    {
        return Some(candidate.value);
    }
    first_money(record, &["precio", "precio_publico", "precio_lista"])
}

fn source_currency(record: &Value) -> Option<String> {
    record
        .get("moneda")
        .and_then(Value::as_str)
        .or_else(|| {
            record
                .get("precios")
                .and_then(|prices| prices.get("moneda"))
                .and_then(Value::as_str)
        })
        .map(str::to_lowercase)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::MarginPolicy;

    fn exchange() -> ExchangeContext {
        ExchangeContext {
            settlement_currency: "mxn".to_string(),
            rate: 18.5,
            fallback_rate: 18.0,
        }
    }

    fn fixed_pricing() -> PricingConfig {
        PricingConfig {
            margin_min: 0.2,
            margin_max: 0.2,
            tax_multiplier: 1.16,
            margin_policy: MarginPolicy::Deterministic,
            ..PricingConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_mapping() {
        let record = json!({
            "sku": "A1",
            "nombre": "Cam 1",
            "precios": {"descuento": "1000"},
            "existencia": 5,
            "peso_kg": 1500,
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert_eq!(product.sku, "A1");
        assert_eq!(product.title, "Cam 1");
        assert!((product.cost - 1000.0).abs() < f64::EPSILON);
        assert!((product.price - 1392.0).abs() < f64::EPSILON);
        assert_eq!(product.available, 5);
        assert!((product.weight_kg - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_identity_is_skipped() {
        let record = json!({"precios": {"descuento": "1000"}, "existencia": 3});
        assert_eq!(
            map_product(&record, &exchange(), &fixed_pricing(), vec![]),
            Err(SkipReason::MissingIdentity)
        );

        let record = json!({"sku": "A1", "precios": {"descuento": "1000"}});
        assert_eq!(
            map_product(&record, &exchange(), &fixed_pricing(), vec![]),
            Err(SkipReason::MissingIdentity)
        );
    }

    #[test]
    fn test_unpriced_record_is_skipped() {
        let record = json!({"sku": "A1", "nombre": "Cam", "precios": {"lista": "40"}});
        assert_eq!(
            map_product(&record, &exchange(), &fixed_pricing(), vec![]),
            Err(SkipReason::Unpriced)
        );
    }

    #[test]
    fn test_usd_record_converted_to_settlement() {
        let record = json!({
            "sku": "B2",
            "nombre": "Radio",
            "moneda": "USD",
            "precios": {"precio_descuentos": "100"},
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert!((product.cost - 1850.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_level_price_fallback() {
        let record = json!({
            "sku": "C3",
            "nombre": "Sensor",
            "precio_publico": "250.00",
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert!((product.cost - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_numeric_sku_rendered_as_text() {
        let record = json!({
            "codigo": 12345,
            "titulo": "Switch",
            "precios": {"neto": "300"},
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert_eq!(product.sku, "12345");
    }

    #[test]
    fn test_vendor_from_marca_object_or_string() {
        assert_eq!(
            vendor_name(&json!({"marca": {"nombre": "Hikvision"}})),
            Some("Hikvision".to_string())
        );
        assert_eq!(
            vendor_name(&json!({"marca": "Dahua"})),
            Some("Dahua".to_string())
        );
        assert_eq!(
            vendor_name(&json!({"fabricante": "Ubiquiti"})),
            Some("Ubiquiti".to_string())
        );
        assert_eq!(vendor_name(&json!({})), None);
    }

    #[test]
    fn test_category_from_array_or_object() {
        let record = json!({
            "sku": "D4",
            "nombre": "NVR",
            "categorias": [{"nombre": "Videovigilancia"}],
            "precios": {"neto": "900"},
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert_eq!(product.product_type, "Videovigilancia");
    }

    #[test]
    fn test_stock_defaults_to_zero_and_never_negative() {
        let record = json!({
            "sku": "E5",
            "nombre": "Cable",
            "precios": {"neto": "120"},
            "existencia": "no disponible",
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert_eq!(product.available, 0);

        let record = json!({
            "sku": "E5",
            "nombre": "Cable",
            "precios": {"neto": "120"},
            "existencia": -4,
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert_eq!(product.available, 0);
    }

    #[test]
    fn test_barcode_extracted_when_present() {
        let record = json!({
            "sku": "F6",
            "nombre": "Lente",
            "precios": {"neto": "600"},
            "ean": "7501031311309",
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert_eq!(product.barcode, Some("7501031311309".to_string()));
    }

    #[test]
    fn test_small_weight_kept_as_kilograms() {
        let record = json!({
            "sku": "G7",
            "nombre": "Camara",
            "precios": {"neto": "700"},
            "peso": 2.4,
        });
        let product =
            map_product(&record, &exchange(), &fixed_pricing(), vec![]).expect("mapped");
        assert!((product.weight_kg - 2.4).abs() < f64::EPSILON);
    }
}
