//! Exchange-rate probe.
//!
//! Authenticates against the distributor and prints the current quotes.
//! Useful for checking credentials and for eyeballing the rate a sync run
//! would use, without touching the storefront.

use mayoreo_syscom::SyscomClient;

use crate::config::SyncConfig;

/// Fetch and log the distributor's exchange rate quotes.
///
/// # Errors
///
/// Returns an error when the credentials are missing or rejected, or when
/// the rate endpoint fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::syscom_from_env()?;
    let client = SyscomClient::new(&config);

    client.authenticate().await?;
    let info = client.exchange_rate_info().await?;

    tracing::info!(
        normal = info.normal,
        un_dia = info.un_dia,
        "distributor exchange rate"
    );
    Ok(())
}
