//! Cost selection over the vendor price map, and margin/tax sale pricing.
//!
//! The distributor's `precios` mapping is unordered and inconsistently
//! labeled across catalog entries, so selection runs a tiered heuristic:
//! exact preferred keys first, then discount-looking key names, then
//! everything that is not obviously a list price. Where several candidates
//! qualify within a tier, the minimum wins — the most conservative proxy
//! for "the discounted/net cost" when field names cannot be trusted.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::{MarginPolicy, PricingConfig};
use crate::money::{parse_money, round2};

/// Key names that look like a discounted/net price.
static DISCOUNT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)descuent|especial|oferta|neto").unwrap()
});

/// Key names that look like a list/public/MSRP price, excluded from the
/// broad fallback tier.
static LIST_KEY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)lista|list|publico|msrp|sin_desc|base").unwrap()
});

/// A selected cost price and the price-map key it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    /// Finite, non-negative parsed value.
    pub value: f64,
    /// Price-map key the value was read from.
    pub source_key: String,
}

/// Select the cost price from the vendor's price map.
///
/// Tiers, in strict order; the first tier producing a qualifying candidate
/// wins:
///
/// 1. exact keys from `preference`, in order;
/// 2. keys matching the discount pattern, minimum qualifying value;
/// 3. keys not matching the list-price pattern, minimum qualifying value;
/// 4. any key, list-like included, minimum qualifying value above 1
///    (rejects fractional-percentage fields);
/// 5. otherwise `None`.
///
/// "Qualifying" means the value parses to a finite number at or above
/// `min_price`; no tier admits a value below the threshold, so a map
/// holding only implausibly small prices selects nothing.
#[must_use]
pub fn select_price(
    prices: &Map<String, Value>,
    preference: &[String],
    min_price: f64,
) -> Option<PriceCandidate> {
    for key in preference {
        if let Some(raw) = prices.get(key)
            && let Some(value) = parse_money(raw)
            && value >= min_price
        {
            return Some(PriceCandidate {
                value,
                source_key: key.clone(),
            });
        }
    }

    let qualifying = |min: f64| {
        move |(key, raw): (&String, &Value)| {
            parse_money(raw)
                .filter(|value| *value >= min)
                .map(|value| PriceCandidate {
                    value,
                    source_key: key.clone(),
                })
        }
    };

    let minimum = |candidates: Vec<PriceCandidate>| {
        candidates
            .into_iter()
            .min_by(|a, b| a.value.total_cmp(&b.value))
    };

    let discount_tier: Vec<_> = prices
        .iter()
        .filter(|(key, _)| DISCOUNT_KEY.is_match(key))
        .filter_map(qualifying(min_price))
        .collect();
    if let Some(best) = minimum(discount_tier) {
        return Some(best);
    }

    let non_list_tier: Vec<_> = prices
        .iter()
        .filter(|(key, _)| !LIST_KEY.is_match(key))
        .filter_map(qualifying(min_price))
        .collect();
    if let Some(best) = minimum(non_list_tier) {
        return Some(best);
    }

    // Last resort: list-like keys re-enter, but the threshold still holds
    // and values at or below 1 are out, so a stray "0.16" tax-fraction
    // field cannot become the cost.
    let any_tier: Vec<_> = prices
        .iter()
        .filter_map(qualifying(min_price))
        .filter(|candidate| candidate.value > 1.0)
        .collect();
    minimum(any_tier)
}

/// Compute the customer-facing sale price from the settlement-currency cost.
///
/// `round2(round2(cost * (1 + margin)) * tax)` — rounding is applied at the
/// margin step and again after tax, mirroring currency-unit rounding at each
/// commercial step. Callers must not invoke this with a non-positive cost;
/// such products are unpriced and skipped.
#[must_use]
pub fn compute_sale_price(cost: f64, config: &PricingConfig, seed_key: &str) -> f64 {
    let margin = pick_margin(config, seed_key);
    round2(round2(cost * (1.0 + margin)) * config.tax_multiplier)
}

fn pick_margin(config: &PricingConfig, seed_key: &str) -> f64 {
    let (min, max) = (config.margin_min, config.margin_max);
    if max <= min {
        return min;
    }
    match config.margin_policy {
        MarginPolicy::Random => rand::rng().random_range(min..=max),
        MarginPolicy::Deterministic => {
            #[allow(clippy::cast_precision_loss)] // uniformity loss is irrelevant here
            let unit = xxh3_64(seed_key.as_bytes()) as f64 / u64::MAX as f64;
            min + unit * (max - min)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn prices(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn preference() -> Vec<String> {
        PricingConfig::default().preference_order
    }

    #[test]
    fn test_exact_preferred_key_wins() {
        let map = prices(&[
            ("descuento", json!("999.00")),
            ("lista", json!("1500.00")),
        ]);
        let order = vec!["descuento".to_string(), "lista".to_string()];
        let candidate = select_price(&map, &order, 50.0).expect("candidate");
        assert!((candidate.value - 999.0).abs() < f64::EPSILON);
        assert_eq!(candidate.source_key, "descuento");
    }

    #[test]
    fn test_below_threshold_yields_nothing() {
        let map = prices(&[("lista", json!("40"))]);
        assert_eq!(select_price(&map, &preference(), 50.0), None);
    }

    #[test]
    fn test_pattern_tier_picks_minimum() {
        let map = prices(&[
            ("descuento_mayorista", json!("800")),
            ("precio_oferta_web", json!("750")),
            ("especial_contado", json!("900")),
        ]);
        let candidate = select_price(&map, &preference(), 50.0).expect("candidate");
        assert!((candidate.value - 750.0).abs() < f64::EPSILON);
        assert_eq!(candidate.source_key, "precio_oferta_web");
    }

    #[test]
    fn test_exclusion_tier_skips_list_like_keys() {
        let map = prices(&[
            ("precio_lista", json!("1500")),
            ("publico", json!("1400")),
            ("mayorista", json!("1100")),
        ]);
        let candidate = select_price(&map, &preference(), 50.0).expect("candidate");
        assert_eq!(candidate.source_key, "mayorista");
    }

    #[test]
    fn test_last_resort_admits_list_keys_but_rejects_fractions() {
        let map = prices(&[("lista", json!("1200")), ("factor", json!("0.16"))]);
        let candidate = select_price(&map, &preference(), 50.0).expect("candidate");
        assert!((candidate.value - 1200.0).abs() < f64::EPSILON);
        assert_eq!(candidate.source_key, "lista");
    }

    #[test]
    fn test_last_resort_still_honors_threshold() {
        // A lone list price below the threshold selects nothing, even in
        // the final tier.
        let map = prices(&[("lista", json!("40"))]);
        assert_eq!(select_price(&map, &preference(), 50.0), None);

        let map = prices(&[("lista", json!("55"))]);
        let candidate = select_price(&map, &preference(), 50.0).expect("candidate");
        assert!((candidate.value - 55.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_map_yields_nothing() {
        assert_eq!(select_price(&Map::new(), &preference(), 50.0), None);
    }

    #[test]
    fn test_unparseable_values_are_skipped() {
        let map = prices(&[
            ("precio_descuentos", json!("n/a")),
            ("neto", json!("850.00")),
        ]);
        let candidate = select_price(&map, &preference(), 50.0).expect("candidate");
        assert_eq!(candidate.source_key, "neto");
    }

    #[test]
    fn test_sale_price_margin_then_tax_with_double_rounding() {
        let config = PricingConfig {
            margin_min: 0.2,
            margin_max: 0.2,
            tax_multiplier: 1.16,
            ..PricingConfig::default()
        };
        let price = compute_sale_price(1000.0, &config, "A1");
        assert!((price - 1392.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deterministic_margin_is_stable_per_sku() {
        let config = PricingConfig {
            margin_min: 0.15,
            margin_max: 0.25,
            margin_policy: MarginPolicy::Deterministic,
            ..PricingConfig::default()
        };
        let first = compute_sale_price(1000.0, &config, "SKU1");
        let second = compute_sale_price(1000.0, &config, "SKU1");
        assert!((first - second).abs() < f64::EPSILON);

        let other = compute_sale_price(1000.0, &config, "SKU2");
        // Distinct SKUs almost surely land on distinct margins.
        assert!((first - other).abs() > f64::EPSILON);
    }

    #[test]
    fn test_random_margin_stays_in_band() {
        let config = PricingConfig {
            margin_min: 0.15,
            margin_max: 0.25,
            tax_multiplier: 1.0,
            ..PricingConfig::default()
        };
        for _ in 0..100 {
            let price = compute_sale_price(1000.0, &config, "X");
            assert!((1150.0..=1250.0).contains(&price), "price: {price}");
        }
    }
}
