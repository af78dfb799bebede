//! Text and JSON rendering of a finished run

use colored::Colorize;
use serde::Serialize;
use stampede_core::{AlertTrigger, LoadTestStatus, LoadTestSummary, RealTimeMetrics, TestState};
use stampede_notify::AggregateMetrics;
use std::fmt::Write;

/// Everything `stampede run` reports about one test
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub status: LoadTestStatus,
    pub summary: Option<LoadTestSummary>,
    pub metrics: RealTimeMetrics,
    pub triggers: Vec<AlertTrigger>,
    pub notifications: AggregateMetrics,
}

pub fn progress_line(status: &LoadTestStatus, metrics: Option<&RealTimeMetrics>) -> String {
    let mut line = format!(
        "{} {:>5.1}%",
        status.test_id.bold(),
        status.progress * 100.0
    );
    if let Some(m) = metrics {
        let _ = write!(
            line,
            "  users {:>4}  rps {:>8.1}  avg {:>7.1}ms  errors {:>5.1}%",
            m.active_users,
            m.requests_per_second,
            m.average_response_time.as_secs_f64() * 1000.0,
            m.error_rate
        );
    }
    line
}

fn state_label(state: TestState) -> colored::ColoredString {
    match state {
        TestState::Completed => state.as_str().green().bold(),
        TestState::Failed => state.as_str().red().bold(),
        TestState::Cancelled => state.as_str().yellow().bold(),
        TestState::Pending | TestState::Running => state.as_str().cyan(),
    }
}

fn millis(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{} {} ({})",
        "Load test".bold(),
        report.status.test_id,
        state_label(report.status.status)
    );
    if let Some(error) = &report.status.error {
        let _ = writeln!(out, "  {} {}", "error:".red(), error);
    }

    if let Some(summary) = &report.summary {
        let _ = writeln!(out, "\n{}", "Summary".bold().underline());
        let _ = writeln!(out, "  target          {} {}", summary.config.effective_method(), summary.config.url);
        let _ = writeln!(out, "  duration        {:.2}s", summary.total_duration.as_secs_f64());
        let _ = writeln!(
            out,
            "  requests        {} ({} ok, {} failed)",
            summary.total_requests, summary.successful_requests, summary.failed_requests
        );
        let _ = writeln!(out, "  throughput      {:.2} req/s", summary.requests_per_second);
        let error_rate = format!("{:.2}%", summary.error_rate);
        let error_rate = if summary.error_rate > 0.0 {
            error_rate.red()
        } else {
            error_rate.green()
        };
        let _ = writeln!(out, "  error rate      {}", error_rate);
        let _ = writeln!(
            out,
            "  response time   avg {:.1}ms  min {:.1}ms  max {:.1}ms",
            millis(summary.average_response_time),
            millis(summary.min_response_time),
            millis(summary.max_response_time)
        );

        if !summary.status_codes.is_empty() {
            let codes: Vec<String> = summary
                .status_codes
                .iter()
                .map(|(code, count)| format!("{}×{}", code, count))
                .collect();
            let _ = writeln!(out, "  status codes    {}", codes.join("  "));
        }

        let d = &summary.response_time_distribution;
        let _ = writeln!(
            out,
            "  distribution    <100ms {}  100-500ms {}  500ms-1s {}  1-2s {}  >2s {}",
            d.under_100ms, d.from_100ms_to_500ms, d.from_500ms_to_1s, d.from_1s_to_2s, d.over_2s
        );
    }

    let m = &report.metrics;
    if m.total_requests > 0 {
        let _ = writeln!(out, "\n{}", "Latency".bold().underline());
        let _ = writeln!(
            out,
            "  p50 {:.1}ms  p95 {:.1}ms  p99 {:.1}ms  stddev {:.1}ms",
            millis(m.percentile_50),
            millis(m.percentile_95),
            millis(m.percentile_99),
            millis(m.standard_deviation)
        );
        let _ = writeln!(out, "  bandwidth {:.0} B/s", m.bandwidth);
    }

    if !report.triggers.is_empty() {
        let _ = writeln!(out, "\n{}", "Alerts".bold().underline());
        for trigger in &report.triggers {
            let _ = writeln!(
                out,
                "  {} {}",
                trigger.triggered_at.format("%H:%M:%S").to_string().dimmed(),
                trigger.message.yellow()
            );
        }
        let n = &report.notifications;
        if n.total_deliveries > 0 {
            let _ = writeln!(
                out,
                "  notifications: {} sent, {} failed",
                n.successful_deliveries, n.failed_deliveries
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::LoadTestStatus;

    #[test]
    fn test_text_report_without_summary() {
        colored::control::set_override(false);
        let mut status = LoadTestStatus::pending("broken-run");
        status.status = TestState::Failed;
        status.error = Some("invalid header name".to_string());

        let report = RunReport {
            status,
            summary: None,
            metrics: RealTimeMetrics::default(),
            triggers: Vec::new(),
            notifications: AggregateMetrics::default(),
        };
        let text = render_text(&report);
        assert!(text.contains("broken-run (failed)"));
        assert!(text.contains("error: invalid header name"));
        assert!(!text.contains("Summary"));
        assert!(!text.contains("Alerts"));
    }

    #[test]
    fn test_progress_line() {
        colored::control::set_override(false);
        let mut status = LoadTestStatus::pending("live");
        status.progress = 0.5;
        let metrics = RealTimeMetrics {
            active_users: 4,
            requests_per_second: 40.0,
            ..RealTimeMetrics::default()
        };
        let line = progress_line(&status, Some(&metrics));
        assert!(line.starts_with("live  50.0%"));
        assert!(line.contains("users    4"));
    }
}
