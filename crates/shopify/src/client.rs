//! HTTP transport for the Admin API: GraphQL execution plus REST helpers.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::instrument;

use crate::{AdminError, GraphQLError, GraphQLErrorLocation};

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Store handle (the `{store}` in `{store}.myshopify.com`).
    pub store: String,
    /// Admin API version, e.g. `2025-07`.
    pub api_version: String,
    /// Admin API access token.
    pub access_token: SecretString,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Shopify Admin API client.
///
/// Cheap to clone. GraphQL is the primary surface; a few operations fall
/// back to REST where the Admin schema offers no equivalent.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    /// `https://{store}.myshopify.com/admin/api/{version}` (no trailing slash).
    admin_base: String,
    access_token: String,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    locations: Vec<GraphQLErrorLocationResponse>,
    #[serde(default)]
    path: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorLocationResponse {
    line: i64,
    column: i64,
}

impl AdminClient {
    /// Create a new client for the configured store.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &ShopifyConfig) -> Self {
        let admin_base = format!(
            "https://{}.myshopify.com/admin/api/{}",
            config.store, config.api_version
        );
        Self::from_parts(admin_base, config.access_token.expose_secret().to_string())
    }

    /// Create a client against an explicit base URL. Used by tests to point
    /// at a local mock server.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn from_parts(admin_base: String, access_token: String) -> Self {
        #[allow(clippy::expect_used)]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(AdminClientInner {
                client,
                admin_base,
                access_token,
            }),
        }
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL query or mutation against the Admin endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::RateLimited` when Shopify throttles the call,
    /// `AdminError::Unauthorized` when the token is rejected,
    /// `AdminError::GraphQL` when the response carries top-level errors, and
    /// `AdminError::Http` on network failures.
    #[instrument(skip(self, query, variables))]
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, AdminError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables.unwrap_or(Value::Null)
        });

        let response = self
            .inner
            .client
            .post(format!("{}/graphql.json", self.inner.admin_base))
            .header("X-Shopify-Access-Token", &self.inner.access_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(AdminError::RateLimited(retry_after));
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdminError::Unauthorized);
        }

        let graphql_response: GraphQLResponse<T> = response.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted_errors: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    locations: e
                        .locations
                        .into_iter()
                        .map(|l| GraphQLErrorLocation {
                            line: l.line,
                            column: l.column,
                        })
                        .collect(),
                    path: e.path,
                })
                .collect();
            return Err(AdminError::GraphQL(converted_errors));
        }

        graphql_response.data.ok_or_else(|| {
            AdminError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                locations: vec![],
                path: vec![],
            }])
        })
    }

    // =========================================================================
    // REST Helpers
    // =========================================================================

    pub(crate) async fn rest_get(&self, path: &str) -> Result<Value, AdminError> {
        let response = self
            .inner
            .client
            .get(format!("{}{path}", self.inner.admin_base))
            .header("X-Shopify-Access-Token", &self.inner.access_token)
            .send()
            .await?;
        Self::rest_body(response).await
    }

    pub(crate) async fn rest_post(&self, path: &str, body: &Value) -> Result<Value, AdminError> {
        let response = self
            .inner
            .client
            .post(format!("{}{path}", self.inner.admin_base))
            .header("X-Shopify-Access-Token", &self.inner.access_token)
            .json(body)
            .send()
            .await?;
        Self::rest_body(response).await
    }

    pub(crate) async fn rest_put(&self, path: &str, body: &Value) -> Result<Value, AdminError> {
        let response = self
            .inner
            .client
            .put(format!("{}{path}", self.inner.admin_base))
            .header("X-Shopify-Access-Token", &self.inner.access_token)
            .json(body)
            .send()
            .await?;
        Self::rest_body(response).await
    }

    async fn rest_body(response: reqwest::Response) -> Result<Value, AdminError> {
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(AdminError::RateLimited(retry_after));
        }
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdminError::Unauthorized);
        }
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_config_debug_redacts_token() {
        let config = ShopifyConfig {
            store: "mi-tienda".to_string(),
            api_version: "2025-07".to_string(),
            access_token: SecretString::from("shpat_secret"),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("shpat_secret"));
    }

    #[test]
    fn test_admin_base_from_config() {
        let config = ShopifyConfig {
            store: "mi-tienda".to_string(),
            api_version: "2025-07".to_string(),
            access_token: SecretString::from("tok"),
        };
        let client = AdminClient::new(&config);
        assert_eq!(
            client.inner.admin_base,
            "https://mi-tienda.myshopify.com/admin/api/2025-07"
        );
    }

    #[tokio::test]
    async fn test_execute_sends_token_and_parses_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql.json"))
            .and(header("X-Shopify-Access-Token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"shop": {"name": "Mi Tienda"}},
            })))
            .mount(&server)
            .await;

        let client = AdminClient::from_parts(server.uri(), "tok".to_string());
        let data: Value = client.execute("query { shop { name } }", None).await.expect("execute");
        assert_eq!(data["shop"]["name"], "Mi Tienda");
    }

    #[tokio::test]
    async fn test_execute_surfaces_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "Throttled"}],
            })))
            .mount(&server)
            .await;

        let client = AdminClient::from_parts(server.uri(), "tok".to_string());
        let err = client
            .execute::<Value>("mutation { noop }", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::GraphQL(_)));
        assert!(err.to_string().contains("Throttled"));
    }

    #[tokio::test]
    async fn test_execute_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql.json"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let client = AdminClient::from_parts(server.uri(), "tok".to_string());
        let err = client.execute::<Value>("query { shop { name } }", None).await.unwrap_err();
        assert!(matches!(err, AdminError::RateLimited(7)));
    }

    #[tokio::test]
    async fn test_rest_maps_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/1.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = AdminClient::from_parts(server.uri(), "tok".to_string());
        let err = client.rest_get("/products/1.json").await.unwrap_err();
        assert!(matches!(err, AdminError::Unauthorized));
    }
}
