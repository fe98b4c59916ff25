//! Settlement-currency normalization.

/// Exchange rates below this are treated as a degenerate default (the rate
/// service occasionally reports 1) rather than a real MXN-per-USD rate.
const MIN_PLAUSIBLE_RATE: f64 = 10.0;

/// Per-run exchange context: the settlement currency the storefront lists
/// prices in, the rate fetched once at startup, and the configured fallback
/// used when the fetched rate is implausible.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    /// Lowercase settlement currency code (e.g. "mxn").
    pub settlement_currency: String,
    /// Settlement-currency units per USD, as fetched this run.
    pub rate: f64,
    /// Constant applied when `rate` fails the plausibility floor.
    pub fallback_rate: f64,
}

impl ExchangeContext {
    /// Convert `amount` into the settlement currency.
    ///
    /// An absent or unknown source currency is treated as already settled;
    /// only USD triggers conversion. The fetched rate is used when it clears
    /// the plausibility floor, otherwise the fallback constant.
    #[must_use]
    pub fn to_settlement(&self, amount: f64, source_currency: Option<&str>) -> f64 {
        let Some(code) = source_currency else {
            return amount;
        };
        if code.eq_ignore_ascii_case(&self.settlement_currency) {
            return amount;
        }
        if code.eq_ignore_ascii_case("usd") {
            let rate = if self.rate > MIN_PLAUSIBLE_RATE {
                self.rate
            } else {
                self.fallback_rate
            };
            return amount * rate;
        }
        // Unknown currency codes pass through unchanged.
        amount
    }
}
