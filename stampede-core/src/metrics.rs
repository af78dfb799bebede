//! Point-in-time metrics snapshot

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::duration_millis;

/// Statistics over a set of results. Recomputed on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealTimeMetrics {
    pub active_users: usize,
    pub requests_per_second: f64,
    #[serde(with = "duration_millis")]
    pub average_response_time: Duration,
    /// Failed requests as a percentage of all requests
    pub error_rate: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    #[serde(with = "duration_millis")]
    pub percentile_50: Duration,
    #[serde(with = "duration_millis")]
    pub percentile_95: Duration,
    #[serde(with = "duration_millis")]
    pub percentile_99: Duration,
    /// Requests per second over the observed wall-clock span
    pub throughput: f64,
    /// Response bytes per second over the observed wall-clock span
    pub bandwidth: f64,
    #[serde(with = "duration_millis")]
    pub min_response_time: Duration,
    #[serde(with = "duration_millis")]
    pub max_response_time: Duration,
    #[serde(with = "duration_millis")]
    pub standard_deviation: Duration,
    /// Population variance of durations, in nanoseconds squared
    pub variance: f64,
}
