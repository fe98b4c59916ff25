//! Pure transformation core for the distributor → storefront catalog sync.
//!
//! Everything in this crate is side-effect free: it takes loosely-typed
//! vendor JSON (kept as [`serde_json::Value`], since the distributor's
//! record shape is inconsistent across catalog entries) and produces
//! normalized, storefront-ready product records.
//!
//! The pipeline, leaf first:
//!
//! - [`money`] — parse heterogeneous currency-formatted strings/numbers
//! - [`pricing`] — tiered cost selection and margin/tax sale pricing
//! - [`currency`] — settlement-currency normalization with a sanity floor
//! - [`images`] — candidate image URLs from the record, plus speculative
//!   sibling URLs derived from the vendor's asset naming conventions
//! - [`product`] — composition of the above into a [`NormalizedProduct`]
//!
//! I/O-bearing image discovery (directory listings, page scrapes, existence
//! probes) lives in the distributor client crate, not here.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod currency;
pub mod images;
pub mod money;
pub mod pricing;
pub mod product;

pub use config::{ImageConfig, MarginPolicy, PricingConfig};
pub use currency::ExchangeContext;
pub use money::{parse_money, parse_money_str, round2};
pub use pricing::{PriceCandidate, compute_sale_price, select_price};
pub use product::{NormalizedProduct, SkipReason, map_product};
