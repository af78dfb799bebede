//! Metric lookup and condition evaluation

use stampede_core::{ComparisonOperator, RealTimeMetrics, Result, StampedeError, ValidationError};
use std::time::Duration;

/// A condition split into its parts, e.g. `error_rate>=5`
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCondition {
    pub metric: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    ActiveUsers,
    RequestsPerSecond,
    AverageResponseTime,
    ErrorRate,
    TotalRequests,
    SuccessfulRequests,
    FailedRequests,
    Percentile50,
    Percentile95,
    Percentile99,
    Throughput,
    Bandwidth,
    MinResponseTime,
    MaxResponseTime,
    StandardDeviation,
    Variance,
}

impl Metric {
    fn lookup(name: &str) -> Option<Self> {
        let metric = match name.trim().to_ascii_lowercase().as_str() {
            "active_users" => Metric::ActiveUsers,
            "requests_per_second" | "rps" => Metric::RequestsPerSecond,
            "response_time" | "avg_response_time" | "average_response_time" => {
                Metric::AverageResponseTime
            }
            "error_rate" => Metric::ErrorRate,
            "total_requests" => Metric::TotalRequests,
            "successful_requests" => Metric::SuccessfulRequests,
            "failed_requests" => Metric::FailedRequests,
            "p50" | "percentile_50" => Metric::Percentile50,
            "p95" | "percentile_95" => Metric::Percentile95,
            "p99" | "percentile_99" => Metric::Percentile99,
            "throughput" => Metric::Throughput,
            "bandwidth" => Metric::Bandwidth,
            "min_response_time" => Metric::MinResponseTime,
            "max_response_time" => Metric::MaxResponseTime,
            "std_dev" | "stddev" | "standard_deviation" => Metric::StandardDeviation,
            "variance" => Metric::Variance,
            _ => return None,
        };
        Some(metric)
    }

    fn value(self, m: &RealTimeMetrics) -> f64 {
        match self {
            Metric::ActiveUsers => m.active_users as f64,
            // Throughput and request rate are one quantity under two names
            Metric::RequestsPerSecond | Metric::Throughput => m.requests_per_second,
            Metric::AverageResponseTime => millis(m.average_response_time),
            Metric::ErrorRate => m.error_rate,
            Metric::TotalRequests => m.total_requests as f64,
            Metric::SuccessfulRequests => m.successful_requests as f64,
            Metric::FailedRequests => m.failed_requests as f64,
            Metric::Percentile50 => millis(m.percentile_50),
            Metric::Percentile95 => millis(m.percentile_95),
            Metric::Percentile99 => millis(m.percentile_99),
            Metric::Bandwidth => m.bandwidth,
            Metric::MinResponseTime => millis(m.min_response_time),
            Metric::MaxResponseTime => millis(m.max_response_time),
            Metric::StandardDeviation => millis(m.standard_deviation),
            // ns^2 to ms^2
            Metric::Variance => m.variance / 1e12,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

/// Whether `name` is a metric alerts can refer to
pub fn is_known_metric(name: &str) -> bool {
    Metric::lookup(name).is_some()
}

/// Read a metric by name or synonym, case-insensitively.
/// Durations come back in milliseconds.
pub fn extract_metric_value(name: &str, metrics: &RealTimeMetrics) -> Result<f64> {
    Metric::lookup(name)
        .map(|metric| metric.value(metrics))
        .ok_or_else(|| StampedeError::unsupported(format!("unknown metric: '{}'", name)))
}

/// Apply `value <operator> threshold`. `=` is accepted as `==`.
pub fn evaluate_condition(value: f64, operator: &str, threshold: f64) -> Result<bool> {
    let operator: ComparisonOperator = operator
        .parse()
        .map_err(|e: stampede_core::ParseError| StampedeError::unsupported(e.to_string()))?;
    Ok(operator.compare(value, threshold))
}

/// Split `<metric><operator><threshold>` at the first operator token,
/// trying two-character operators before one-character ones.
pub fn parse_condition(text: &str) -> Result<ParsedCondition> {
    let (index, token) = ComparisonOperator::SCAN_ORDER
        .iter()
        .find_map(|token| text.find(token).map(|index| (index, *token)))
        .ok_or_else(|| invalid_condition(text, "no comparison operator found"))?;

    let metric = text[..index].trim();
    let raw_threshold = text[index + token.len()..].trim();

    if metric.is_empty() {
        return Err(invalid_condition(text, "missing metric name"));
    }

    let threshold: f64 = raw_threshold
        .parse()
        .map_err(|_| invalid_condition(text, "threshold is not a number"))?;
    if !threshold.is_finite() {
        return Err(invalid_condition(text, "threshold is not a number"));
    }

    let operator = token
        .parse()
        .map_err(|e: stampede_core::ParseError| StampedeError::unsupported(e.to_string()))?;

    Ok(ParsedCondition {
        metric: metric.to_string(),
        operator,
        threshold,
    })
}

fn invalid_condition(text: &str, reason: &str) -> StampedeError {
    ValidationError::new(
        "condition",
        text,
        "condition",
        format!("invalid condition '{}': {}", text, reason),
    )
    .into()
}
