//! Alerting for Stampede load tests
//!
//! The [`evaluator`] turns a metrics snapshot and a condition into a
//! decision. [`AlertManager`] owns alerts, their trigger log and reusable
//! templates, enforces each alert's cooldown and hands firings to an
//! [`stampede_notify::AlertNotifier`]. [`AlertMonitor`] evaluates a running
//! test's alerts on a fixed interval.

pub mod evaluator;
pub mod manager;
pub mod monitor;

pub use evaluator::{
    evaluate_condition, extract_metric_value, is_known_metric, parse_condition, ParsedCondition,
};
pub use manager::{AlertManager, AlertStats, AlertUpdate, NewAlert, NewTemplate, TemplateUpdate};
pub use monitor::{AlertMonitor, MIN_MONITOR_INTERVAL};
