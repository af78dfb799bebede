//! Shared client construction

use crate::errors::HttpError;
use reqwest::Client;
use stampede_config::HttpConfig;
use tracing::debug;

/// Build the pooled client shared by every virtual user of an engine
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    debug!(
        timeout_secs = config.timeout.as_secs(),
        max_idle_per_host = config.connection_pool.max_idle_per_host,
        "Creating HTTP client"
    );

    let client = Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connection_pool.connection_timeout.min(config.timeout))
        .pool_max_idle_per_host(config.connection_pool.max_idle_per_host)
        .pool_idle_timeout(config.connection_pool.idle_timeout)
        .user_agent(&config.user_agent)
        .danger_accept_invalid_certs(!config.verify_ssl)
        .build()?;

    Ok(client)
}
