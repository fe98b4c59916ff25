//! HTTP client for the distributor's catalog API.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::SyscomError;

/// Default OAuth token endpoint.
const DEFAULT_OAUTH_URL: &str = "https://developers.syscom.mx/oauth/token";
/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://developers.syscom.mx/api/v1";

/// Product id embedded in a catalog URL (`.../productos/12345`).
static PRODUCT_URL_ID: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"productos/(\d+)").unwrap()
});

/// Distributor API configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct SyscomConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
    /// Currency requested from the catalog endpoints (`moneda` parameter).
    pub currency: String,
    /// API base URL (overridable for tests).
    pub base_url: String,
    /// OAuth token endpoint (overridable for tests).
    pub oauth_url: String,
}

impl SyscomConfig {
    /// Configuration against the production endpoints.
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, currency: String) -> Self {
        Self {
            client_id,
            client_secret,
            currency,
            base_url: DEFAULT_BASE_URL.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for SyscomConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyscomConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("base_url", &self.base_url)
            .field("oauth_url", &self.oauth_url)
            .finish()
    }
}

/// Exchange rate quotes from the distributor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRateInfo {
    /// Spot rate (settlement-currency units per USD).
    pub normal: f64,
    /// Next-day rate.
    pub un_dia: f64,
}

/// Distributor catalog API client.
///
/// Cheap to clone; the bearer token obtained by [`authenticate`] is cached
/// in memory for the run.
///
/// [`authenticate`]: SyscomClient::authenticate
#[derive(Clone)]
pub struct SyscomClient {
    inner: Arc<SyscomClientInner>,
}

struct SyscomClientInner {
    client: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    currency: String,
    /// In-memory token cache, one token per run.
    token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl SyscomClient {
    /// Create a new client from configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &SyscomConfig) -> Self {
        #[allow(clippy::expect_used)]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(SyscomClientInner {
                client,
                base_url: config.base_url.clone(),
                oauth_url: config.oauth_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
                currency: config.currency.clone(),
                token: RwLock::new(None),
            }),
        }
    }

    /// Obtain a bearer token via the OAuth client-credentials grant and
    /// cache it for subsequent calls.
    ///
    /// # Errors
    ///
    /// Returns [`SyscomError::Auth`] when the token endpoint rejects the
    /// credentials; this is fatal for the run.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<(), SyscomError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.as_str()),
        ];

        let response = self
            .inner
            .client
            .post(&self.inner.oauth_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyscomError::Auth(format!("token request failed: {text}")));
        }

        let token: TokenResponse = response.json().await?;
        *self.inner.token.write().await = Some(token.access_token);

        Ok(())
    }

    /// Fetch the current exchange rate quotes.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the payload carries no
    /// usable rate. Callers substitute a configured fallback; this endpoint
    /// is never fatal.
    #[instrument(skip(self))]
    pub async fn exchange_rate_info(&self) -> Result<ExchangeRateInfo, SyscomError> {
        let body = self.get("/tipocambio", &[]).await?;

        let normal = rate_field(&body, "normal").ok_or_else(|| {
            SyscomError::UnexpectedResponse("exchange rate payload missing 'normal'".to_string())
        })?;
        let un_dia = rate_field(&body, "un_dia").unwrap_or(0.0);

        Ok(ExchangeRateInfo { normal, un_dia })
    }

    /// Fetch the spot exchange rate.
    ///
    /// # Errors
    ///
    /// See [`exchange_rate_info`](Self::exchange_rate_info).
    pub async fn exchange_rate(&self) -> Result<f64, SyscomError> {
        Ok(self.exchange_rate_info().await?.normal)
    }

    /// Search the catalog by free-text query. An empty result means the
    /// pagination is exhausted, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no token is cached.
    #[instrument(skip(self))]
    pub async fn search_products(
        &self,
        query: &str,
        page: u32,
        only_stock: bool,
    ) -> Result<Vec<Value>, SyscomError> {
        let params = [
            ("busqueda", query.to_string()),
            ("stock", stock_flag(only_stock)),
            ("agrupar", "1".to_string()),
            ("pagina", page.to_string()),
            ("moneda", self.inner.currency.clone()),
        ];
        let body = self.get("/productos", &params).await?;
        Ok(extract_product_rows(body))
    }

    /// List a brand's products, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no token is cached.
    #[instrument(skip(self))]
    pub async fn brand_products(
        &self,
        brand: &str,
        page: u32,
        only_stock: bool,
    ) -> Result<Vec<Value>, SyscomError> {
        let params = [
            ("stock", stock_flag(only_stock)),
            ("agrupar", "1".to_string()),
            ("pagina", page.to_string()),
            ("moneda", self.inner.currency.clone()),
        ];
        let path = format!("/marcas/{brand}/productos");
        let body = self.get(&path, &params).await?;
        Ok(extract_product_rows(body))
    }

    /// Fetch the full-shape detail record for one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no token is cached.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product_detail(&self, id: &str) -> Result<Value, SyscomError> {
        let params = [("moneda", self.inner.currency.clone())];
        let path = format!("/productos/{id}");
        let mut body = self.get(&path, &params).await?;

        // Some endpoints wrap the record in a "data" envelope.
        match body.get_mut("data") {
            Some(data) if !data.is_null() => Ok(data.take()),
            _ => Ok(body),
        }
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, SyscomError> {
        let token = self
            .inner
            .token
            .read()
            .await
            .clone()
            .ok_or(SyscomError::NoAccessToken)?;

        let url = format!("{}{path}", self.inner.base_url);
        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// Unwrap a listing row from its optional envelope (`producto`, `item`, …).
#[must_use]
pub fn unwrap_row(row: &Value) -> &Value {
    for key in ["producto", "Producto", "item", "Item"] {
        if let Some(inner) = row.get(key)
            && inner.is_object()
        {
            return inner;
        }
    }
    row
}

/// Extract a product id from a listing row: the usual id fields first, then
/// digits captured from a catalog URL. `None` means the row is unusable and
/// is skipped silently.
#[must_use]
pub fn summary_product_id(row: &Value) -> Option<String> {
    let row = unwrap_row(row);

    if let Some(id) = mayoreo_core::product::first_text(
        row,
        &["id", "producto_id", "id_producto", "pid"],
    ) {
        return Some(id);
    }

    for key in ["url", "link", "href"] {
        if let Some(url) = row.get(key).and_then(Value::as_str)
            && let Some(caps) = PRODUCT_URL_ID.captures(url)
        {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }

    None
}

/// Pull the product array out of whichever envelope the listing endpoint
/// used: `data.productos`, `data`, `productos`, or the bare root.
fn extract_product_rows(body: Value) -> Vec<Value> {
    let candidates = [
        body.pointer("/data/productos"),
        body.get("data"),
        body.get("productos"),
        Some(&body),
    ];
    for candidate in candidates {
        if let Some(Value::Array(rows)) = candidate {
            return rows.clone();
        }
    }
    Vec::new()
}

fn rate_field(body: &Value, field: &str) -> Option<f64> {
    let raw = body
        .get(field)
        .or_else(|| body.pointer(&format!("/data/{field}")))?;
    raw.as_f64()
        .or_else(|| raw.as_str().and_then(|s| s.parse().ok()))
        .filter(|rate| rate.is_finite())
}

fn stock_flag(only_stock: bool) -> String {
    if only_stock { "1" } else { "0" }.to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(server: &MockServer) -> SyscomConfig {
        SyscomConfig {
            client_id: "id".to_string(),
            client_secret: SecretString::from("secret"),
            currency: "mxn".to_string(),
            base_url: format!("{}/api/v1", server.uri()),
            oauth_url: format!("{}/oauth/token", server.uri()),
        }
    }

    #[test]
    fn test_unwrap_row_envelopes() {
        let enveloped = json!({"producto": {"id": 1}});
        assert_eq!(unwrap_row(&enveloped), &json!({"id": 1}));

        let bare = json!({"id": 2});
        assert_eq!(unwrap_row(&bare), &bare);
    }

    #[test]
    fn test_summary_product_id_from_fields() {
        assert_eq!(summary_product_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(
            summary_product_id(&json!({"producto": {"producto_id": "77"}})),
            Some("77".to_string())
        );
    }

    #[test]
    fn test_summary_product_id_from_url() {
        let row = json!({"link": "https://example.mx/productos/12345?ref=x"});
        assert_eq!(summary_product_id(&row), Some("12345".to_string()));
    }

    #[test]
    fn test_summary_product_id_absent() {
        assert_eq!(summary_product_id(&json!({"nombre": "sin id"})), None);
    }

    #[test]
    fn test_extract_product_rows_shapes() {
        let nested = json!({"data": {"productos": [{"id": 1}]}});
        assert_eq!(extract_product_rows(nested).len(), 1);

        let data_array = json!({"data": [{"id": 1}, {"id": 2}]});
        assert_eq!(extract_product_rows(data_array).len(), 2);

        let flat = json!({"productos": [{"id": 1}]});
        assert_eq!(extract_product_rows(flat).len(), 1);

        let bare = json!([{"id": 1}]);
        assert_eq!(extract_product_rows(bare).len(), 1);

        let empty = json!({"data": {"productos": []}});
        assert!(extract_product_rows(empty).is_empty());

        let junk = json!({"mensaje": "sin resultados"});
        assert!(extract_product_rows(junk).is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_and_search() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/productos"))
            .and(query_param("busqueda", "camaras"))
            .and(query_param("pagina", "1"))
            .and(query_param("stock", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"productos": [{"producto": {"id": 9}}]},
            })))
            .mount(&server)
            .await;

        let client = SyscomClient::new(&test_config(&server));
        client.authenticate().await.expect("authenticate");

        let rows = client
            .search_products("camaras", 1, true)
            .await
            .expect("search");
        assert_eq!(rows.len(), 1);
        assert_eq!(summary_product_id(&rows[0]), Some("9".to_string()));
    }

    #[tokio::test]
    async fn test_calls_require_authentication() {
        let server = MockServer::start().await;
        let client = SyscomClient::new(&test_config(&server));

        let err = client.search_products("x", 1, true).await.unwrap_err();
        assert!(matches!(err, SyscomError::NoAccessToken));
    }

    #[tokio::test]
    async fn test_exchange_rate_from_string_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/tipocambio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "normal": "18.23",
                "un_dia": "18.40",
            })))
            .mount(&server)
            .await;

        let client = SyscomClient::new(&test_config(&server));
        client.authenticate().await.expect("authenticate");

        let info = client.exchange_rate_info().await.expect("rate");
        assert!((info.normal - 18.23).abs() < f64::EPSILON);
        assert!((info.un_dia - 18.40).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_product_detail_unwraps_data_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/productos/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"sku": "A1", "nombre": "Cam"},
            })))
            .mount(&server)
            .await;

        let client = SyscomClient::new(&test_config(&server));
        client.authenticate().await.expect("authenticate");

        let detail = client.product_detail("9").await.expect("detail");
        assert_eq!(detail["sku"], "A1");
    }
}
