//! Periodic alert evaluation for a running test

use std::sync::Arc;
use std::time::Duration;

use stampede_core::{AlertTrigger, TestState};
use stampede_engine::LoadTestEngine;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::manager::AlertManager;

/// Shortest evaluation period; smaller values are raised to it
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// Feeds a test's real-time metrics to the alert manager on a fixed interval
pub struct AlertMonitor;

impl AlertMonitor {
    /// Evaluate `test_id`'s alerts every `every` while it runs.
    ///
    /// Waits through `pending`, stops once the test is terminal or unknown,
    /// and resolves to every trigger fired along the way. `every` is raised
    /// to [`MIN_MONITOR_INTERVAL`] if shorter.
    pub fn watch(
        engine: LoadTestEngine,
        manager: Arc<AlertManager>,
        test_id: impl Into<String>,
        every: Duration,
    ) -> JoinHandle<Vec<AlertTrigger>> {
        let test_id = test_id.into();
        let every = every.max(MIN_MONITOR_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut fired = Vec::new();

            loop {
                ticker.tick().await;

                let status = match engine.get_test_status(&test_id).await {
                    Ok(status) => status.status,
                    Err(e) => {
                        debug!(test_id = %test_id, error = %e, "Stopping alert monitor");
                        break;
                    }
                };
                match status {
                    TestState::Pending => continue,
                    TestState::Running => {}
                    _ => break,
                }

                // The run may finish between the two reads
                let Ok(metrics) = engine.get_realtime_metrics(&test_id).await else {
                    continue;
                };
                fired.extend(manager.evaluate_alerts(&test_id, &metrics).await);
            }

            info!(test_id = %test_id, triggers = fired.len(), "Alert monitor finished");
            fired
        })
    }
}
