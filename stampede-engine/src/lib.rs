//! Load test engine for Stampede
//!
//! [`LoadTestEngine`] runs tests concurrently, one task per virtual user and a
//! collector per test, and keeps their status, results and summaries in
//! memory. [`metrics`] holds the pure statistics used for summaries and
//! metric snapshots, and [`EngineRegistry`] keeps independent engines by ID.

pub mod engine;
pub mod metrics;
pub mod registry;

pub use engine::LoadTestEngine;
pub use metrics::{calculate_advanced_metrics, percentile, summarize, window_metrics};
pub use registry::EngineRegistry;
