//! Distributor (Syscom) catalog API client.
//!
//! Covers the four external surfaces the sync needs from the distributor:
//! OAuth client-credentials token acquisition, the per-run exchange rate,
//! paginated product search (by free-text query or by brand), and
//! full-shape product detail records. Detail records are returned as
//! [`serde_json::Value`] — their shape varies per product and is consumed
//! by the best-effort extraction in `mayoreo-core`.
//!
//! The I/O-bearing image discovery stages (asset-directory listings, public
//! page scraping, existence probes) live in [`discovery`].

#![cfg_attr(not(test), forbid(unsafe_code))]

mod client;
pub mod discovery;

pub use client::{ExchangeRateInfo, SyscomClient, SyscomConfig, summary_product_id, unwrap_row};

use thiserror::Error;

/// Errors from the distributor API client.
#[derive(Debug, Error)]
pub enum SyscomError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// OAuth token acquisition failed. Fatal for the run.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A call was made before `authenticate()`.
    #[error("No access token; call authenticate() first")]
    NoAccessToken,

    /// The API answered with an unexpected payload.
    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),
}
