//! Sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP` - Storefront handle (the `{store}` in `{store}.myshopify.com`)
//! - `ADMIN_TOKEN` - Storefront Admin API access token
//! - `SYSCOM_CLIENT_ID` - Distributor OAuth client ID
//! - `SYSCOM_CLIENT_SECRET` - Distributor OAuth client secret
//!
//! ## Optional
//! - `SYSCOM_MODE` - `search` or `brand` (default: search)
//! - `SYSCOM_QUERY` - Search query, or brand slug in brand mode (default: camaras)
//! - `RUN_PAGES` - Pages fetched per run (default: 2)
//! - `SLEEP_MS` - Pause between records in milliseconds (default: 900)
//! - `SYSCOM_ONLY_STOCK` - Only list in-stock products (default: on)
//! - `SYSCOM_CURRENCY` - Settlement currency (default: mxn)
//! - `IVA_RATE` - Tax multiplier (default: 1.16)
//! - `MARGIN_MIN` / `MARGIN_MAX` - Margin band (defaults: 0.15 / 0.25)
//! - `MARGIN_POLICY` - `random` or `deterministic` (default: random)
//! - `SET_PRICE` - Write prices on existing variants (default: on)
//! - `SYSCOM_MAX_IMAGES` - Image cap per product (default: 8)
//! - `SYSCOM_PRICE_MIN` - Minimum plausible price candidate (default: 50)
//! - `SYSCOM_RATE_FALLBACK` - Exchange rate fallback (default: 18)
//! - `SYSCOM_FTP_DIR_SCAN` - Asset directory scan stage (default: on)
//! - `SYSCOM_SCRAPE_HTML` - Page scrape stage (default: on)
//! - `SYSCOM_VALIDATE_IMAGES` - HEAD-probe image candidates (default: off)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-07)

use mayoreo_core::{ImageConfig, MarginPolicy, PricingConfig};
use mayoreo_shopify::ShopifyConfig;
use mayoreo_syscom::SyscomConfig;
use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which catalog listing the run walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogMode {
    /// Free-text search over the whole catalog.
    Search,
    /// One brand's product listing; the query holds the brand slug.
    Brand,
}

/// Run-shape parameters: what to fetch and how fast.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: CatalogMode,
    /// Search query, or brand slug in brand mode.
    pub query: String,
    /// Pages fetched before stopping (an empty page stops earlier).
    pub pages: u32,
    /// Pause between records, in milliseconds.
    pub sleep_ms: u64,
    pub only_stock: bool,
    /// Whether to write prices on existing variants.
    pub set_price: bool,
    /// Exchange rate used when the quote endpoint fails or is implausible.
    pub rate_fallback: f64,
    /// Settlement currency.
    pub currency: String,
}

/// Full sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub shopify: ShopifyConfig,
    pub syscom: SyscomConfig,
    pub pricing: PricingConfig,
    pub images: ImageConfig,
    pub run: RunConfig,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let shopify = ShopifyConfig {
            store: get_required_env("SHOP")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2025-07"),
            access_token: SecretString::from(get_required_env("ADMIN_TOKEN")?),
        };

        let currency = get_env_or_default("SYSCOM_CURRENCY", "mxn").to_lowercase();
        let syscom = SyscomConfig::new(
            get_required_env("SYSCOM_CLIENT_ID")?,
            SecretString::from(get_required_env("SYSCOM_CLIENT_SECRET")?),
            currency.clone(),
        );

        let pricing = PricingConfig {
            min_price: get_parsed_or_default("SYSCOM_PRICE_MIN", 50.0)?,
            margin_min: get_parsed_or_default("MARGIN_MIN", 0.15)?,
            margin_max: get_parsed_or_default("MARGIN_MAX", 0.25)?,
            tax_multiplier: get_parsed_or_default("IVA_RATE", 1.16)?,
            margin_policy: parse_margin_policy(&get_env_or_default("MARGIN_POLICY", "random"))
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        "MARGIN_POLICY".to_string(),
                        "expected 'random' or 'deterministic'".to_string(),
                    )
                })?,
            ..PricingConfig::default()
        };

        let images = ImageConfig {
            max_images: get_parsed_or_default("SYSCOM_MAX_IMAGES", 8)?,
            dir_scan: parse_flag(&get_env_or_default("SYSCOM_FTP_DIR_SCAN", "on")),
            page_scrape: parse_flag(&get_env_or_default("SYSCOM_SCRAPE_HTML", "on")),
            validate: parse_flag(&get_env_or_default("SYSCOM_VALIDATE_IMAGES", "off")),
        };

        let run = RunConfig {
            mode: parse_catalog_mode(&get_env_or_default("SYSCOM_MODE", "search")).ok_or_else(
                || {
                    ConfigError::InvalidEnvVar(
                        "SYSCOM_MODE".to_string(),
                        "expected 'search' or 'brand'".to_string(),
                    )
                },
            )?,
            query: get_env_or_default("SYSCOM_QUERY", "camaras"),
            pages: get_parsed_or_default("RUN_PAGES", 2)?,
            sleep_ms: get_parsed_or_default("SLEEP_MS", 900)?,
            only_stock: parse_flag(&get_env_or_default("SYSCOM_ONLY_STOCK", "on")),
            set_price: parse_flag(&get_env_or_default("SET_PRICE", "on")),
            rate_fallback: get_parsed_or_default("SYSCOM_RATE_FALLBACK", 18.0)?,
            currency,
        };

        Ok(Self {
            shopify,
            syscom,
            pricing,
            images,
            run,
        })
    }

    /// Load only the distributor credentials, for commands that never touch
    /// the storefront (the exchange-rate probe).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the distributor variables are missing.
    pub fn syscom_from_env() -> Result<SyscomConfig, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(SyscomConfig::new(
            get_required_env("SYSCOM_CLIENT_ID")?,
            SecretString::from(get_required_env("SYSCOM_CLIENT_SECRET")?),
            get_env_or_default("SYSCOM_CURRENCY", "mxn").to_lowercase(),
        ))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn get_parsed_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Loose on/off flag parsing. Anything not recognisably off counts as on,
/// so `SET_PRICE=yes` and `SET_PRICE=1` both enable.
fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off" | ""
    )
}

fn parse_margin_policy(raw: &str) -> Option<MarginPolicy> {
    match raw.trim().to_lowercase().as_str() {
        "random" => Some(MarginPolicy::Random),
        "deterministic" => Some(MarginPolicy::Deterministic),
        _ => None,
    }
}

fn parse_catalog_mode(raw: &str) -> Option<CatalogMode> {
    match raw.trim().to_lowercase().as_str() {
        "search" => Some(CatalogMode::Search),
        "brand" => Some(CatalogMode::Brand),
        _ => None,
    }
}
