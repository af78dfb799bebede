//! Client settings for the traffic a load test sends

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// reqwest pools per host only, so the global idle limit lands here
const DEFAULT_MAX_IDLE_PER_HOST: usize = 100;

/// Shared by every virtual user of every test an engine runs.
///
/// A request exceeding `timeout` is recorded as a failed result, it never
/// aborts the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    pub user_agent: String,

    /// Disable only for targets with self-signed certificates
    pub verify_ssl: bool,

    pub connection_pool: ConnectionPoolConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPoolConfig {
    pub max_idle_per_host: usize,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub idle_timeout: Duration,

    /// TCP/TLS connect budget; the client caps it at the request timeout
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub connection_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("Stampede/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_ssl: true,
            connection_pool: ConnectionPoolConfig::default(),
        }
    }
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        let domain = self.domain_name();
        validate_positive(self.timeout.as_secs(), "timeout", domain)?;
        validate_required_string(&self.user_agent, "user_agent", domain)?;

        let pool = &self.connection_pool;
        validate_positive(pool.max_idle_per_host, "connection_pool.max_idle_per_host", domain)?;
        validate_positive(pool.idle_timeout.as_secs(), "connection_pool.idle_timeout", domain)?;
        validate_positive(
            pool.connection_timeout.as_secs(),
            "connection_pool.connection_timeout",
            domain,
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_load_profile() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connection_pool.max_idle_per_host, 100);
        assert_eq!(config.connection_pool.idle_timeout, Duration::from_secs(90));
        assert!(config.user_agent.starts_with("Stampede/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_is_whole_seconds() {
        // Connect budget above the request timeout is capped by the client
        let mut config = HttpConfig::default();
        config.timeout = Duration::from_secs(3);
        assert!(config.validate().is_ok());

        config.timeout = Duration::from_millis(500);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_errors_name_the_nested_field() {
        let mut config = HttpConfig::default();
        config.connection_pool.max_idle_per_host = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connection_pool.max_idle_per_host"));
    }

    #[test]
    fn test_partial_yaml_keeps_pool_defaults() {
        let config: HttpConfig = serde_yaml::from_str("timeout: 12\nverify_ssl: false\n").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert!(!config.verify_ssl);
        assert_eq!(config.connection_pool, ConnectionPoolConfig::default());
    }
}
