//! Core domain models and types for Stampede
//!
//! This crate contains the fundamental types shared by the load test engine,
//! alerting and notification crates: the load test model, the metrics
//! snapshot, alerts and their channels, the error taxonomy and input
//! validation. It performs no I/O.

pub mod alert;
pub mod error;
pub mod metrics;
pub mod types;
pub mod validation;

// Re-export commonly used types at the crate root
pub use alert::{
    Alert, AlertId, AlertTemplate, AlertTrigger, ChannelType, Notification, NotificationChannel,
    NotificationId, TemplateId, TriggerId,
};
pub use error::{EntityKind, Result, StampedeError, ValidationError};
pub use load_test::{
    generate_test_id, LoadTestConfig, LoadTestResult, LoadTestStatus, LoadTestSummary,
    ResponseTimeDistribution,
};
pub use metrics::RealTimeMetrics;
pub use types::{ComparisonOperator, HttpMethod, ParseError, Severity, TestState};
pub use validation::{validate_config, validate_test_id};
