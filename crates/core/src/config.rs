//! Tunable values consumed by the pricing and image pipelines.
//!
//! These are plain value structs, constructed once at process start from the
//! environment and passed by reference into each component. The heuristics
//! never read ambient configuration themselves.

use serde::{Deserialize, Serialize};

/// How the margin applied on top of cost is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarginPolicy {
    /// Uniform draw from the margin band, independently per call.
    /// Favors price variety over reproducibility.
    #[default]
    Random,
    /// Margin derived from a stable hash of the product SKU, so repeated
    /// runs price the same product identically.
    Deterministic,
}

/// Cost-selection and sale-price parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price-map keys tried first, in order, before any pattern matching.
    pub preference_order: Vec<String>,
    /// Candidates below this value are treated as implausible and skipped.
    pub min_price: f64,
    /// Lower bound of the margin band (fraction, e.g. 0.15).
    pub margin_min: f64,
    /// Upper bound of the margin band.
    pub margin_max: f64,
    /// Tax multiplier applied after the margin step (e.g. 1.16 for IVA).
    pub tax_multiplier: f64,
    /// Margin selection policy.
    pub margin_policy: MarginPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            preference_order: [
                "precio_descuentos",
                "precio_especial",
                "con_descuento",
                "con_descuentos",
                "precio_descuento",
                "neto",
                "precio_neto",
                "mi_precio",
                "oferta",
                "especial",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_price: 50.0,
            margin_min: 0.15,
            margin_max: 0.25,
            tax_multiplier: 1.16,
            margin_policy: MarginPolicy::Random,
        }
    }
}

/// Image collection parameters and stage toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Upper bound on candidate URLs per product.
    pub max_images: usize,
    /// Scan the asset host's directory listings when the record
    /// under-reports images.
    pub dir_scan: bool,
    /// Scrape the public product page as a last resort.
    pub page_scrape: bool,
    /// HEAD-probe candidates and drop the ones that do not exist.
    pub validate: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_images: 8,
            dir_scan: true,
            page_scrape: true,
            validate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preference_order_starts_with_exact_keys() {
        let config = PricingConfig::default();
        assert_eq!(config.preference_order[0], "precio_descuentos");
        assert_eq!(config.preference_order[1], "precio_especial");
    }

    #[test]
    fn test_margin_policy_serde_round_trip() {
        let json = serde_json::to_string(&MarginPolicy::Deterministic).expect("serialize");
        assert_eq!(json, "\"deterministic\"");
        let parsed: MarginPolicy = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, MarginPolicy::Deterministic);
    }
}
