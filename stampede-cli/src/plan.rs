//! Load test plan files

use anyhow::{Context, Result};
use serde::Deserialize;
use stampede_alerting::NewAlert;
use stampede_core::{validate_config, validate_test_id, LoadTestConfig};
use std::path::Path;

/// A load test and the alerts to watch it with
///
/// ```yaml
/// test_id: checkout-smoke
/// load:
///   url: https://shop.example.com/api/checkout
///   concurrent_users: 20
///   duration: 1m
/// alerts:
///   - name: Errors
///     condition: error_rate>5
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TestPlan {
    #[serde(default)]
    pub test_id: Option<String>,
    pub load: LoadTestConfig,
    #[serde(default)]
    pub alerts: Vec<NewAlert>,
}

impl TestPlan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {:?}", path))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse plan file {:?}", path))
    }

    /// Check the load configuration, the test ID if one is set, and every alert
    pub fn validate(&self) -> Result<()> {
        if let Some(test_id) = &self.test_id {
            validate_test_id(test_id).context("Invalid test_id")?;
        }
        validate_config(&self.load).context("Invalid load configuration")?;
        for (index, alert) in self.alerts.iter().enumerate() {
            alert
                .validate()
                .with_context(|| format!("Invalid alert #{} ({})", index + 1, alert.name))?;
        }
        Ok(())
    }
}
