//! Candidate image URLs from the vendor record, without any network I/O.
//!
//! The distributor's API is known to under-report available images, and the
//! image-bearing fields vary in shape from record to record: a single cover
//! URL, ordered `{url, orden}` arrays, plain string arrays, object arrays
//! keyed `url`/`src`/`original`/`big`/`hires`, and resource galleries. On
//! top of direct extraction, the collector speculates "sibling" URLs from
//! the asset host's filename conventions (`name-0.jpg` → `name-1.jpg` …);
//! siblings are never existence-checked here.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Size/quality query parameters dropped to produce a high-res variant.
static SIZE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)([?&](?:w|h|width|height|size|max|quality|q)=[^&#]+)+").unwrap()
});

/// Image file extensions accepted from resource galleries.
static IMAGE_EXT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)\.(png|jpe?g|webp|gif)([?#]|$)").unwrap()
});

/// Splits a URL into base and extension (query string discarded).
static EXT_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)(\.[a-z0-9]+)(\?.*)?$").unwrap()
});

/// Trailing `-N` numeric suffix, used to skip sibling synthesis for URLs
/// that already look like gallery members.
static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"-\d+$").unwrap()
});

/// Collect image URLs directly present in the record, cover image first.
///
/// Each accepted URL also contributes a query-stripped variant, since
/// high-resolution originals often share the base URL with size hints
/// removed. The result is deduplicated in discovery order and capped at
/// `max_images`.
#[must_use]
pub fn collect_basic_images(record: &Value, max_images: usize) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(cover) = record.get("img_portada").and_then(Value::as_str) {
        push_with_variant(&mut out, cover);
    }

    if let Some(items) = record.get("imagenes").and_then(Value::as_array) {
        let mut ordered: Vec<&Value> = items
            .iter()
            .filter(|item| item.get("url").and_then(Value::as_str).is_some())
            .collect();
        ordered.sort_by(|a, b| orden_of(a).total_cmp(&orden_of(b)));
        for item in ordered {
            if let Some(url) = item.get("url").and_then(Value::as_str) {
                push_with_variant(&mut out, url);
            }
        }
    }

    for field in ["fotos", "galeria", "imagenes_url"] {
        if let Some(items) = record.get(field).and_then(Value::as_array) {
            for item in items {
                if let Some(url) = url_from_entry(item) {
                    push_with_variant(&mut out, url);
                }
            }
        }
    }

    if let Some(url) = record.get("imagen").and_then(Value::as_str) {
        push_with_variant(&mut out, url);
    }

    if let Some(resources) = record.get("recursos").and_then(Value::as_array) {
        for resource in resources {
            let url = resource
                .get("url")
                .and_then(Value::as_str)
                .or_else(|| resource.get("src").and_then(Value::as_str));
            if let Some(url) = url
                && IMAGE_EXT.is_match(url)
            {
                push_with_variant(&mut out, url);
            }
        }
    }

    let mut unique = dedup_preserving_order(out);
    unique.truncate(max_images);
    unique
}

/// Generate speculative sibling URLs from the vendor's asset naming
/// conventions. No existence checks are performed.
#[must_use]
pub fn guess_siblings(url: &str) -> Vec<String> {
    let (base, ext) = if let Some(caps) = EXT_SPLIT.captures(url) {
        let start = caps.get(0).map_or(url.len(), |m| m.start());
        let ext = caps.get(1).map_or("", |m| m.as_str());
        (&url[..start], ext)
    } else {
        (url, "")
    };

    let mut out = Vec::new();

    // name-0 / name_0 → siblings 1..8
    if let Some((prefix, sep)) = split_separator_suffix(base, "0") {
        for i in 1..=8 {
            out.push(format!("{prefix}{sep}{i}{ext}"));
        }
    }
    // name-1 / name_1 → siblings 2..8
    if let Some((prefix, sep)) = split_separator_suffix(base, "1") {
        for i in 2..=8 {
            out.push(format!("{prefix}{sep}{i}{ext}"));
        }
    }
    // name-p → bare, numbered, -AD-{n}-p, -i and -LIST-i renditions
    if let Some((prefix, sep)) =
        split_separator_suffix(base, "p").or_else(|| split_separator_suffix(base, "P"))
    {
        out.push(format!("{prefix}{ext}"));
        for i in 1..=8 {
            out.push(format!("{prefix}{sep}{i}{ext}"));
            out.push(format!("{prefix}{sep}AD-{i}-p{ext}"));
        }
        out.push(format!("{prefix}{sep}i{ext}"));
        out.push(format!("{prefix}{sep}LIST-i{ext}"));
    }
    // Unsuffixed names get the catalog's standard renditions.
    let ends_with_p = base.to_ascii_lowercase().ends_with("-p");
    if !ends_with_p && !TRAILING_NUMBER.is_match(base) {
        out.push(format!("{base}-i{ext}"));
        out.push(format!("{base}-LIST-i{ext}"));
        for i in 1..=3 {
            out.push(format!("{base}-AD-{i}-p{ext}"));
        }
    }

    dedup_preserving_order(out)
}

/// Direct extraction plus sibling inference, deduplicated and capped.
#[must_use]
pub fn build_image_list(record: &Value, max_images: usize) -> Vec<String> {
    let base = collect_basic_images(record, max_images);
    let mut want = base.clone();

    'outer: for url in &base {
        for sibling in guess_siblings(url) {
            if want.len() >= max_images {
                break 'outer;
            }
            if !want.contains(&sibling) {
                want.push(sibling);
            }
        }
    }

    want.truncate(max_images);
    want
}

/// Extract a URL from either a plain string or an object entry.
fn url_from_entry(entry: &Value) -> Option<&str> {
    if let Some(url) = entry.as_str() {
        return Some(url);
    }
    for key in ["url", "src", "original", "big", "hires"] {
        if let Some(url) = entry.get(key).and_then(Value::as_str) {
            return Some(url);
        }
    }
    None
}

fn orden_of(item: &Value) -> f64 {
    item.get("orden").and_then(crate::money::parse_money).unwrap_or(0.0)
}

fn push_with_variant(out: &mut Vec<String>, raw: &str) {
    let url = raw.trim();
    if url.is_empty() {
        return;
    }
    out.push(url.to_string());
    let cleaned = SIZE_QUERY.replace_all(url, "");
    if !cleaned.is_empty() && cleaned != url {
        out.push(cleaned.into_owned());
    }
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn split_separator_suffix<'a>(base: &'a str, suffix: &str) -> Option<(&'a str, char)> {
    let rest = base.strip_suffix(suffix)?;
    let sep = rest.chars().last()?;
    if sep == '-' || sep == '_' {
        Some((&rest[..rest.len() - 1], sep))
    } else {
        None
    }
}
