//! Network-backed image discovery stages.
//!
//! The pure heuristics in `mayoreo-core` (record fields, size variants,
//! sibling guessing) come first and are free. The stages here cost an HTTP
//! round-trip each and run only when the cheap stages under-deliver:
//! directory listings on the distributor's asset host, a scrape of the
//! public product page, and optional existence probes. Every stage is
//! best-effort; failures log at debug level and fall back to whatever was
//! already collected.

use std::sync::LazyLock;
use std::time::Duration;

use mayoreo_core::ImageConfig;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Asset origin used when no collected image URL reveals one.
const DEFAULT_ASSET_ORIGIN: &str = "https://ftp3.syscom.mx";

/// Per-request timeout for discovery probes. These are opportunistic, so
/// they get a shorter leash than the API client.
const PROBE_TIMEOUT: Duration = Duration::from_secs(12);

/// When the cheap stages produce fewer than this many images, the page
/// scrape stage is worth the extra request.
const SCRAPE_THRESHOLD: usize = 4;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r#"(?i)href="([^"]+)""#).unwrap()
});

static IMAGE_EXT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)\.(png|jpe?g|webp|gif)([?#]|$)").unwrap()
});

static ASSET_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r#"https://ftp\d*\.syscom\.mx/[^\s"'<>]+?\.(?:png|jpe?g|webp|gif)"#).unwrap()
});

/// Runs the I/O-bearing discovery stages on top of the record-derived
/// candidate list.
#[derive(Clone)]
pub struct ImageDiscovery {
    client: reqwest::Client,
    config: ImageConfig,
}

impl ImageDiscovery {
    /// Create a discovery runner with its own short-timeout HTTP client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: ImageConfig) -> Self {
        #[allow(clippy::expect_used)]
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Full discovery pipeline for one product record.
    ///
    /// Record-derived candidates first; an asset-directory scan replaces
    /// them when it finds strictly more; the public page is scraped when
    /// the list is still thin; candidates are optionally probed for
    /// existence. Never fails: the worst case is an empty list.
    #[instrument(skip(self, record))]
    pub async fn discover_images(&self, record: &Value) -> Vec<String> {
        let max = self.config.max_images;
        let mut images = mayoreo_core::images::build_image_list(record, max);

        if self.config.dir_scan {
            let scanned = self.images_from_asset_dirs(record, &images).await;
            if scanned.len() > images.len() {
                images = scanned;
            }
        }

        if self.config.page_scrape && images.len() < SCRAPE_THRESHOLD.min(max) {
            let scraped = self.scrape_product_page(record).await;
            images.extend(scraped);
            images = dedup_preserving_order(images);
            images.truncate(max);
        }

        if self.config.validate {
            images = self.validate_images(images).await;
        }

        images
    }

    /// Scan the asset host's directory listings: the directory containing a
    /// known image, plus the conventional brand/SKU directory. The result
    /// is seeded with the already-collected candidates so the cover image
    /// stays first and record images are never lost to the scan.
    async fn images_from_asset_dirs(&self, record: &Value, known: &[String]) -> Vec<String> {
        let max = self.config.max_images;
        let mut dirs = Vec::new();

        if let Some(dir) = known.first().and_then(|url| dir_from_image_url(url)) {
            dirs.push(dir);
        }

        let origin = known
            .first()
            .and_then(|url| origin_of(url))
            .unwrap_or_else(|| DEFAULT_ASSET_ORIGIN.to_string());

        let vendor = mayoreo_core::product::vendor_name(record);
        let sku = mayoreo_core::product::first_text(
            record,
            &["sku", "codigo", "clave", "modelo"],
        );
        if let (Some(vendor), Some(sku)) = (vendor, sku)
            && let Some(dir) = brand_sku_dir(&vendor, &sku, &origin)
        {
            dirs.push(dir);
        }

        let mut found = known.to_vec();
        for dir in dedup_preserving_order(dirs) {
            if found.len() >= max {
                break;
            }
            let listed = self.list_directory_images(&dir).await;
            found.extend(listed);
        }

        let mut found = dedup_preserving_order(found);
        found.truncate(max);
        found
    }

    /// Fetch one directory listing and pull image links out of its HTML.
    async fn list_directory_images(&self, dir_url: &str) -> Vec<String> {
        let html = match self.fetch_text(dir_url).await {
            Some(html) => html,
            None => return Vec::new(),
        };

        let mut images = Vec::new();
        for caps in HREF.captures_iter(&html) {
            let Some(href) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if href.ends_with('/') || !IMAGE_EXT.is_match(href) {
                continue;
            }
            let absolute = if href.starts_with("http://") || href.starts_with("https://") {
                href.to_string()
            } else {
                format!("{}{}", dir_url, href.trim_start_matches('/'))
            };
            images.push(absolute);
            if images.len() >= self.config.max_images {
                break;
            }
        }
        images
    }

    /// Last-resort stage: scrape asset-host image URLs off the public
    /// product page named by the record.
    async fn scrape_product_page(&self, record: &Value) -> Vec<String> {
        let Some(page_url) = mayoreo_core::product::first_text(record, &["link", "url"]) else {
            return Vec::new();
        };

        let html = match self.fetch_text(&page_url).await {
            Some(html) => html,
            None => return Vec::new(),
        };

        let found: Vec<String> = ASSET_IMAGE_URL
            .find_iter(&html)
            .map(|m| m.as_str().to_string())
            .collect();
        dedup_preserving_order(found)
    }

    /// HEAD-probe each candidate and keep the ones that respond 2xx. If
    /// every probe fails the original list is returned unchanged, on the
    /// assumption that the host is rejecting probes rather than missing
    /// every image.
    async fn validate_images(&self, images: Vec<String>) -> Vec<String> {
        let mut confirmed = Vec::new();
        for url in &images {
            let ok = self
                .client
                .head(url)
                .send()
                .await
                .map(|response| response.status().is_success())
                .unwrap_or(false);
            if ok {
                confirmed.push(url.clone());
            } else {
                debug!(url = %url, "image probe failed");
            }
        }

        if confirmed.is_empty() { images } else { confirmed }
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url = %url, error = %err, "discovery fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "discovery fetch rejected");
            return None;
        }
        response.text().await.ok()
    }
}

/// Directory prefix of an image URL, trailing slash included. `None` when
/// the URL has no path to speak of.
#[must_use]
pub fn dir_from_image_url(url: &str) -> Option<String> {
    let idx = url.rfind('/')?;
    // "https://" alone is 8 characters; anything at or before that is
    // scheme punctuation, not a path separator.
    if idx > 8 {
        Some(url[..=idx].to_string())
    } else {
        None
    }
}

/// The conventional per-product directory on the asset host:
/// `{origin}/usuarios/fotos/BancoFotografiasSyscom/{BRAND}/{SKU}/` with the
/// brand uppercased and stripped to alphanumerics.
#[must_use]
pub fn brand_sku_dir(vendor: &str, sku: &str, origin: &str) -> Option<String> {
    let brand: String = vendor
        .to_uppercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if brand.is_empty() || sku.is_empty() {
        return None;
    }
    let encoded_sku = urlencoding::encode(sku);
    Some(format!(
        "{origin}/usuarios/fotos/BancoFotografiasSyscom/{brand}/{encoded_sku}/"
    ))
}

/// Scheme plus authority of a URL (`https://host[:port]`), no trailing slash.
fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|url| seen.insert(url.clone())).collect()
}
