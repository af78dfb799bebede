//! Load test engine configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine tuning knobs shared by every test an engine runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Result channel slots reserved per virtual user
    #[serde(default = "default_results_buffer_per_user")]
    pub results_buffer_per_user: usize,

    /// How often the collector recomputes progress
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_progress_interval"
    )]
    pub progress_interval: Duration,

    /// Trailing window used for real-time metrics
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_realtime_window"
    )]
    pub realtime_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            results_buffer_per_user: default_results_buffer_per_user(),
            progress_interval: default_progress_interval(),
            realtime_window: default_realtime_window(),
        }
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.results_buffer_per_user,
            "results_buffer_per_user",
            self.domain_name(),
        )?;
        validate_positive(
            self.progress_interval.as_millis(),
            "progress_interval",
            self.domain_name(),
        )?;
        validate_positive(
            self.realtime_window.as_secs(),
            "realtime_window",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "engine"
    }
}

fn default_results_buffer_per_user() -> usize {
    10
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_realtime_window() -> Duration {
    Duration::from_secs(10)
}
