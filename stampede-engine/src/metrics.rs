//! Statistics over load test results
//!
//! Everything here is a pure function of its inputs. Aggregations are
//! order-independent because results arrive in completion order.

use chrono::{DateTime, Utc};
use stampede_core::{
    LoadTestConfig, LoadTestResult, LoadTestSummary, RealTimeMetrics, ResponseTimeDistribution,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Full statistics over a result set. An empty set yields the zero snapshot.
pub fn calculate_advanced_metrics(results: &[LoadTestResult]) -> RealTimeMetrics {
    if results.is_empty() {
        return RealTimeMetrics::default();
    }

    let total = results.len() as u64;
    let successful = results.iter().filter(|r| r.success).count() as u64;
    let failed = total - successful;

    let mut durations: Vec<Duration> = results.iter().map(|r| r.duration).collect();
    durations.sort_unstable();

    let total_nanos: u128 = durations.iter().map(Duration::as_nanos).sum();
    let mean_nanos = total_nanos as f64 / total as f64;
    let variance = durations
        .iter()
        .map(|d| {
            let deviation = d.as_nanos() as f64 - mean_nanos;
            deviation * deviation
        })
        .sum::<f64>()
        / total as f64;

    let span = observed_span_secs(results);
    let total_bytes: u64 = results.iter().map(|r| r.response_size).sum();
    let throughput = per_second(total as f64, span);

    RealTimeMetrics {
        active_users: 0,
        requests_per_second: throughput,
        average_response_time: Duration::from_nanos((total_nanos / total as u128) as u64),
        error_rate: error_rate(failed, total),
        total_requests: total,
        successful_requests: successful,
        failed_requests: failed,
        percentile_50: percentile(&durations, 50.0),
        percentile_95: percentile(&durations, 95.0),
        percentile_99: percentile(&durations, 99.0),
        throughput,
        bandwidth: per_second(total_bytes as f64, span),
        min_response_time: durations[0],
        max_response_time: durations[durations.len() - 1],
        standard_deviation: Duration::from_nanos(variance.sqrt() as u64),
        variance,
    }
}

/// Nearest-rank percentile over ascending durations: `sorted[floor(n * p / 100)]`,
/// with the index clamped to the last element. Zero for an empty slice.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (sorted.len() as f64 * p / 100.0).floor();
    let index = if rank.is_sign_negative() || rank.is_nan() {
        0
    } else {
        (rank as usize).min(sorted.len() - 1)
    };
    sorted[index]
}

/// Metrics over the trailing `window` ending at `now`.
///
/// Latency, percentiles and error rate describe only results that started
/// inside the window. Request rate divides by the window, or by the time since
/// the run started if that is shorter. Request counts cover the whole run.
pub fn window_metrics(
    results: &[LoadTestResult],
    run_started: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
    active_users: usize,
) -> RealTimeMetrics {
    let window_start = chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w));
    let recent: Vec<LoadTestResult> = results
        .iter()
        .filter(|r| window_start.map_or(true, |start| r.start_time >= start))
        .cloned()
        .collect();

    let mut metrics = calculate_advanced_metrics(&recent);

    let elapsed = (now - run_started).to_std().unwrap_or(Duration::ZERO);
    metrics.requests_per_second = per_second(recent.len() as f64, window.min(elapsed).as_secs_f64());
    metrics.active_users = active_users;
    metrics.total_requests = results.len() as u64;
    metrics.successful_requests = results.iter().filter(|r| r.success).count() as u64;
    metrics.failed_requests = metrics.total_requests - metrics.successful_requests;
    metrics
}

/// Build the summary of a finished run from its complete result set
pub fn summarize(
    test_id: &str,
    config: &LoadTestConfig,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    results: &[LoadTestResult],
) -> LoadTestSummary {
    let total = results.len() as u64;
    let successful = results.iter().filter(|r| r.success).count() as u64;
    let failed = total - successful;

    let mut status_codes = BTreeMap::new();
    let mut distribution = ResponseTimeDistribution::default();
    let mut total_nanos: u128 = 0;
    let mut min = Duration::MAX;
    let mut max = Duration::ZERO;

    for result in results {
        if let Some(code) = result.status_code {
            *status_codes.entry(code).or_insert(0) += 1;
        }
        distribution.record(result.duration);
        total_nanos += result.duration.as_nanos();
        min = min.min(result.duration);
        max = max.max(result.duration);
    }

    let (average, min) = if total == 0 {
        (Duration::ZERO, Duration::ZERO)
    } else {
        (Duration::from_nanos((total_nanos / total as u128) as u64), min)
    };

    let total_duration = (end_time - start_time).to_std().unwrap_or(Duration::ZERO);

    LoadTestSummary {
        test_id: test_id.to_string(),
        config: config.clone(),
        start_time,
        end_time,
        total_duration,
        total_requests: total,
        successful_requests: successful,
        failed_requests: failed,
        average_response_time: average,
        min_response_time: min,
        max_response_time: max,
        requests_per_second: per_second(total as f64, total_duration.as_secs_f64()),
        error_rate: error_rate(failed, total),
        status_codes,
        response_time_distribution: distribution,
    }
}

fn observed_span_secs(results: &[LoadTestResult]) -> f64 {
    let first_start = results.iter().map(|r| r.start_time).min();
    let last_end = results.iter().map(|r| r.end_time).max();
    match (first_start, last_end) {
        (Some(start), Some(end)) => (end - start)
            .to_std()
            .map(|span| span.as_secs_f64())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn per_second(count: f64, secs: f64) -> f64 {
    if secs > 0.0 {
        count / secs
    } else {
        0.0
    }
}

fn error_rate(failed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        failed as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: DateTime<Utc>, offset_ms: i64) -> DateTime<Utc> {
        base + chrono::Duration::milliseconds(offset_ms)
    }

    fn ok(base: DateTime<Utc>, offset_ms: i64, duration_ms: u64, size: u64) -> LoadTestResult {
        LoadTestResult::response(
            0,
            at(base, offset_ms),
            Duration::from_millis(duration_ms),
            200,
            size,
        )
    }

    #[test]
    fn test_empty_input_is_zero_snapshot() {
        assert_eq!(calculate_advanced_metrics(&[]), RealTimeMetrics::default());
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted: Vec<Duration> = (1..=10).map(Duration::from_millis).collect();
        assert_eq!(percentile(&sorted, 0.0), Duration::from_millis(1));
        assert_eq!(percentile(&sorted, 50.0), Duration::from_millis(6));
        assert_eq!(percentile(&sorted, 95.0), Duration::from_millis(10));
        assert_eq!(percentile(&sorted, 100.0), Duration::from_millis(10));
        assert_eq!(percentile(&[], 50.0), Duration::ZERO);
    }

    #[test]
    fn test_percentile_bounds_match_extremes() {
        let mut sorted: Vec<Duration> = [37u64, 3, 250, 12, 12, 90, 1]
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();
        sorted.sort();
        assert_eq!(percentile(&sorted, 0.0), sorted[0]);
        assert_eq!(percentile(&sorted, 100.0), *sorted.last().unwrap());
    }

    #[test]
    fn test_advanced_metrics() {
        let base = Utc::now();
        let results = vec![
            ok(base, 0, 100, 1000),
            ok(base, 100, 200, 1000),
            ok(base, 300, 300, 1000),
            LoadTestResult::failure(1, at(base, 1500), Duration::from_millis(400), None, "boom"),
        ];

        let metrics = calculate_advanced_metrics(&results);
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.successful_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.error_rate, 25.0);
        assert_eq!(metrics.average_response_time, Duration::from_millis(250));
        assert_eq!(metrics.min_response_time, Duration::from_millis(100));
        assert_eq!(metrics.max_response_time, Duration::from_millis(400));
        assert_eq!(metrics.percentile_50, Duration::from_millis(300));
        assert_eq!(metrics.percentile_99, Duration::from_millis(400));

        // Population variance of 100/200/300/400ms, in ns^2
        let expected_variance = 12_500.0 * 1e12;
        assert!((metrics.variance - expected_variance).abs() / expected_variance < 1e-9);
        assert_eq!(metrics.standard_deviation.as_millis(), 111);

        // Observed span: first start at 0ms, last end at 1900ms
        assert!((metrics.throughput - 4.0 / 1.9).abs() < 1e-9);
        assert!((metrics.bandwidth - 3000.0 / 1.9).abs() < 1e-9);
        assert_eq!(metrics.requests_per_second, metrics.throughput);
    }

    #[test]
    fn test_zero_span_gives_zero_rates() {
        let base = Utc::now();
        let results = vec![ok(base, 0, 0, 500)];
        let metrics = calculate_advanced_metrics(&results);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.bandwidth, 0.0);
        assert_eq!(metrics.total_requests, 1);
    }

    #[test]
    fn test_order_independence() {
        let base = Utc::now();
        let mut results = vec![
            ok(base, 0, 40, 10),
            ok(base, 10, 5, 10),
            ok(base, 20, 90, 10),
            ok(base, 30, 15, 10),
        ];
        let forward = calculate_advanced_metrics(&results);
        results.reverse();
        assert_eq!(calculate_advanced_metrics(&results), forward);
    }

    #[test]
    fn test_summary() {
        let base = Utc::now();
        let config = LoadTestConfig::new("http://localhost", 2);
        let results = vec![
            ok(base, 0, 50, 10),
            ok(base, 10, 150, 10),
            LoadTestResult::response(1, at(base, 20), Duration::from_millis(700), 500, 0),
            LoadTestResult::failure(1, at(base, 30), Duration::from_millis(2500), None, "timeout"),
        ];

        let summary = summarize("test-abc", &config, base, at(base, 2000), &results);
        assert_eq!(summary.test_id, "test-abc");
        assert_eq!(summary.total_requests, 4);
        assert_eq!(summary.successful_requests, 2);
        assert_eq!(summary.failed_requests, 2);
        assert_eq!(summary.error_rate, 50.0);
        assert_eq!(summary.total_duration, Duration::from_secs(2));
        assert_eq!(summary.requests_per_second, 2.0);
        assert_eq!(summary.min_response_time, Duration::from_millis(50));
        assert_eq!(summary.max_response_time, Duration::from_millis(2500));
        assert_eq!(summary.average_response_time, Duration::from_millis(850));
        assert_eq!(summary.status_codes.get(&200), Some(&2));
        assert_eq!(summary.status_codes.get(&500), Some(&1));
        assert_eq!(summary.status_codes.values().sum::<u64>(), 3);

        let dist = &summary.response_time_distribution;
        assert_eq!(dist.under_100ms, 1);
        assert_eq!(dist.from_100ms_to_500ms, 1);
        assert_eq!(dist.from_500ms_to_1s, 1);
        assert_eq!(dist.over_2s, 1);
        assert_eq!(dist.total(), 4);
    }

    #[test]
    fn test_empty_summary() {
        let base = Utc::now();
        let config = LoadTestConfig::new("http://localhost", 1);
        let summary = summarize("test-empty", &config, base, base, &[]);
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.error_rate, 0.0);
        assert_eq!(summary.requests_per_second, 0.0);
        assert_eq!(summary.min_response_time, Duration::ZERO);
    }

    #[test]
    fn test_window_metrics_only_use_recent_results() {
        let start = Utc::now();
        let now = at(start, 30_000);
        let results = vec![
            // Outside the 10s window
            LoadTestResult::failure(0, at(start, 1_000), Duration::from_millis(900), None, "old"),
            ok(start, 5_000, 800, 10),
            // Inside the window
            ok(start, 21_000, 10, 10),
            ok(start, 25_000, 30, 10),
        ];

        let metrics = window_metrics(&results, start, now, Duration::from_secs(10), 3);
        assert_eq!(metrics.active_users, 3);
        assert_eq!(metrics.requests_per_second, 0.2);
        assert_eq!(metrics.average_response_time, Duration::from_millis(20));
        assert_eq!(metrics.error_rate, 0.0);
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.failed_requests, 1);
    }

    #[test]
    fn test_window_rate_early_in_run() {
        let start = Utc::now();
        let now = at(start, 2_000);
        let results = vec![ok(start, 100, 10, 0), ok(start, 900, 10, 0), ok(start, 1_500, 10, 0), ok(start, 1_900, 10, 0)];

        let metrics = window_metrics(&results, start, now, Duration::from_secs(10), 1);
        assert_eq!(metrics.requests_per_second, 2.0);
    }
}
