//! Shopify Admin API client.
//!
//! Wraps the Admin GraphQL endpoint (product/variant/inventory mutations,
//! publication lookup) plus the handful of REST resources GraphQL does not
//! cover for this workload (variant weight, image counts and uploads).
//!
//! All write paths surface `userErrors` from mutation payloads as
//! [`AdminError::UserError`] so the sync loop can log and keep going.

#![cfg_attr(not(test), forbid(unsafe_code))]

mod client;
mod products;
mod types;

pub use client::{AdminClient, ShopifyConfig};
pub use types::{CreatedProduct, ExistingVariant, Location, legacy_id};

use thiserror::Error;

/// Errors from the Shopify Admin API.
#[derive(Debug, Error)]
pub enum AdminError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Access token rejected.
    #[error("Unauthorized - check the Admin API access token")]
    Unauthorized,

    /// A mutation reported `userErrors`.
    #[error("User error: {0}")]
    UserError(String),
}

/// A GraphQL error returned by the Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_error_display() {
        let err = AdminError::NotFound("variant sku-123".to_string());
        assert_eq!(err.to_string(), "Not found: variant sku-123");
    }

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Field not found".to_string(),
                locations: vec![],
                path: vec![],
            },
            GraphQLError {
                message: "Invalid ID".to_string(),
                locations: vec![],
                path: vec![],
            },
        ];
        let err = AdminError::GraphQL(errors);
        assert_eq!(err.to_string(), "GraphQL errors: Field not found; Invalid ID");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = AdminError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_user_error_display() {
        let err = AdminError::UserError("SKU already taken".to_string());
        assert_eq!(err.to_string(), "User error: SKU already taken");
    }
}
