//! Load test engine
//!
//! Each started test gets one task per virtual user and one collector task.
//! Users push results into a bounded channel; the collector appends them to
//! the test's record and advances progress. A per-test cancellation token is
//! shared by every task of the run so cancel stops it promptly.

use chrono::{DateTime, Utc};
use stampede_config::{EngineConfig, HttpConfig, Validatable};
use stampede_core::{
    validate_config, validate_test_id, EntityKind, LoadTestConfig, LoadTestResult,
    LoadTestStatus, LoadTestSummary, RealTimeMetrics, Result, StampedeError, TestState,
};
use stampede_http::{HttpDriver, PreparedRequest, RequestDriver};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio::time::{interval, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{calculate_advanced_metrics, summarize, window_metrics};

/// Upper bound on results moved into a record per lock acquisition
const COLLECT_BATCH: usize = 256;

/// Runs load tests and keeps their state in memory.
///
/// Cloning is cheap; clones share the same tests.
#[derive(Clone)]
pub struct LoadTestEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    driver: Arc<dyn RequestDriver>,
    config: EngineConfig,
    state: RwLock<EngineState>,
}

#[derive(Default)]
struct EngineState {
    tests: HashMap<String, TestRecord>,
    /// IDs evicted by cleanup; never accepted again
    retired: HashSet<String>,
}

struct TestRecord {
    config: Arc<LoadTestConfig>,
    status: LoadTestStatus,
    results: Vec<LoadTestResult>,
    summary: Option<LoadTestSummary>,
    cancel: CancellationToken,
    active_users: Arc<AtomicUsize>,
}

impl std::fmt::Debug for LoadTestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTestEngine")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl LoadTestEngine {
    /// Fails if `config` does not validate (zero progress interval, window
    /// or buffer).
    pub fn new(driver: Arc<dyn RequestDriver>, config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| StampedeError::Configuration(e.to_string()))?;
        Ok(Self::from_validated(driver, config))
    }

    pub(crate) fn from_validated(driver: Arc<dyn RequestDriver>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                driver,
                config,
                state: RwLock::new(EngineState::default()),
            }),
        }
    }

    /// Engine that issues real HTTP requests through a pooled client
    pub fn with_http(http: &HttpConfig, config: EngineConfig) -> Result<Self> {
        let driver = HttpDriver::new(http)
            .map_err(|e| StampedeError::Configuration(format!("HTTP client: {}", e)))?;
        Self::new(Arc::new(driver), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register a test and start running it in the background.
    ///
    /// Returns as soon as the test is registered as pending. Must be called
    /// from within a Tokio runtime.
    pub async fn start_load_test(&self, test_id: &str, config: LoadTestConfig) -> Result<()> {
        validate_test_id(test_id)?;
        validate_config(&config)?;

        let config = Arc::new(config);
        let cancel = CancellationToken::new();
        let active_users = Arc::new(AtomicUsize::new(0));

        {
            let mut state = self.inner.state.write().await;
            if state.tests.contains_key(test_id) || state.retired.contains(test_id) {
                return Err(StampedeError::Conflict(format!(
                    "test {} already exists",
                    test_id
                )));
            }
            state.tests.insert(
                test_id.to_string(),
                TestRecord {
                    config: config.clone(),
                    status: LoadTestStatus::pending(test_id),
                    results: Vec::new(),
                    summary: None,
                    cancel: cancel.clone(),
                    active_users: active_users.clone(),
                },
            );
        }

        info!(
            test_id,
            url = %config.url,
            users = config.concurrent_users,
            duration = ?config.duration,
            "Load test registered"
        );

        let inner = self.inner.clone();
        let test_id = test_id.to_string();
        tokio::spawn(async move {
            inner.run(test_id, config, cancel, active_users).await;
        });

        Ok(())
    }

    pub async fn get_test_status(&self, test_id: &str) -> Result<LoadTestStatus> {
        let state = self.inner.state.read().await;
        state
            .tests
            .get(test_id)
            .map(|record| record.status.clone())
            .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))
    }

    /// Summary of a finished run. Not found until the run's results are drained.
    pub async fn get_test_summary(&self, test_id: &str) -> Result<LoadTestSummary> {
        let state = self.inner.state.read().await;
        let record = state
            .tests
            .get(test_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))?;
        record
            .summary
            .clone()
            .ok_or_else(|| StampedeError::not_found(EntityKind::Summary, test_id))
    }

    pub async fn get_test_results(&self, test_id: &str) -> Result<Vec<LoadTestResult>> {
        let state = self.inner.state.read().await;
        state
            .tests
            .get(test_id)
            .map(|record| record.results.clone())
            .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))
    }

    /// Stop a running test. Fails for pending and terminal tests.
    pub async fn cancel_test(&self, test_id: &str) -> Result<()> {
        let mut state = self.inner.state.write().await;
        let record = state
            .tests
            .get_mut(test_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))?;

        if record.status.status != TestState::Running {
            return Err(not_running(test_id, record.status.status));
        }

        record.status.finish(TestState::Cancelled, Utc::now());
        record.cancel.cancel();
        info!(test_id, "Load test cancelled");
        Ok(())
    }

    pub async fn get_all_tests(&self) -> HashMap<String, LoadTestStatus> {
        let state = self.inner.state.read().await;
        state
            .tests
            .iter()
            .map(|(id, record)| (id.clone(), record.status.clone()))
            .collect()
    }

    /// Metrics over the trailing real-time window. Only while running.
    pub async fn get_realtime_metrics(&self, test_id: &str) -> Result<RealTimeMetrics> {
        let state = self.inner.state.read().await;
        let record = state
            .tests
            .get(test_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))?;

        let started = match (record.status.status, record.status.start_time) {
            (TestState::Running, Some(started)) => started,
            (status, _) => return Err(not_running(test_id, status)),
        };

        Ok(window_metrics(
            &record.results,
            started,
            Utc::now(),
            self.inner.config.realtime_window,
            record.active_users.load(Ordering::SeqCst),
        ))
    }

    /// Full-run statistics over every result collected so far
    pub async fn get_advanced_metrics(&self, test_id: &str) -> Result<RealTimeMetrics> {
        let state = self.inner.state.read().await;
        let record = state
            .tests
            .get(test_id)
            .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))?;

        let mut metrics = calculate_advanced_metrics(&record.results);
        metrics.active_users = record.active_users.load(Ordering::SeqCst);
        Ok(metrics)
    }

    /// Evict terminal tests that ended more than `older_than` ago.
    /// Returns the number of tests removed.
    pub async fn cleanup_old_tests(&self, older_than: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.cleanup_before(cutoff).await,
            None => 0,
        }
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.inner.state.write().await;
        let expired: Vec<String> = state
            .tests
            .iter()
            .filter(|(_, record)| {
                record.status.is_terminal()
                    && record.status.end_time.is_some_and(|ended| ended < cutoff)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(record) = state.tests.remove(id) {
                record.cancel.cancel();
            }
            state.retired.insert(id.clone());
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "Cleaned up old load tests");
        }
        expired.len()
    }

    /// Wait until the test is terminal and, unless it failed during setup,
    /// its summary is available.
    pub async fn wait_for_completion(
        &self,
        test_id: &str,
        poll: Duration,
    ) -> Result<LoadTestStatus> {
        loop {
            {
                let state = self.inner.state.read().await;
                let record = state
                    .tests
                    .get(test_id)
                    .ok_or_else(|| StampedeError::not_found(EntityKind::Test, test_id))?;
                let settled = record.status.status == TestState::Failed || record.summary.is_some();
                if record.status.is_terminal() && settled {
                    return Ok(record.status.clone());
                }
            }
            sleep(poll).await;
        }
    }
}

impl EngineInner {
    async fn run(
        self: Arc<Self>,
        test_id: String,
        config: Arc<LoadTestConfig>,
        cancel: CancellationToken,
        active_users: Arc<AtomicUsize>,
    ) {
        let request = match self.driver.prepare(&config) {
            Ok(request) => Arc::new(request),
            Err(e) => {
                self.fail(&test_id, e.to_string()).await;
                return;
            }
        };

        {
            let mut state = self.state.write().await;
            let Some(record) = state.tests.get_mut(&test_id) else {
                return;
            };
            if !record.status.mark_running(Utc::now()) {
                return;
            }
        }
        info!(test_id = %test_id, "Load test running");

        let started = Instant::now();
        let deadline = started + config.duration;
        let capacity = (config.concurrent_users * self.config.results_buffer_per_user).max(1);
        let (results_tx, results_rx) = mpsc::channel(capacity);

        let collector = tokio::spawn(self.clone().collect(
            test_id.clone(),
            results_rx,
            started,
            config.duration,
        ));

        let mut users = JoinSet::new();
        for user_id in 0..config.concurrent_users {
            users.spawn(virtual_user(VirtualUser {
                user_id,
                driver: self.driver.clone(),
                request: request.clone(),
                results: results_tx.clone(),
                cancel: cancel.clone(),
                deadline,
                start_offset: config.ramp_up_offset(user_id),
                request_delay: config.request_delay,
                active_users: active_users.clone(),
            }));
        }
        drop(results_tx);

        while let Some(joined) = users.join_next().await {
            if let Err(e) = joined {
                warn!(test_id = %test_id, error = %e, "Virtual user task failed");
            }
        }

        // Without the collector the result set is incomplete, so no summary
        if let Err(e) = collector.await {
            self.fail(&test_id, format!("result collector stopped: {}", e))
                .await;
            return;
        }

        self.complete(&test_id).await;
    }

    async fn collect(
        self: Arc<Self>,
        test_id: String,
        mut results: mpsc::Receiver<LoadTestResult>,
        started: Instant,
        duration: Duration,
    ) {
        let mut ticker = interval(self.config.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut batch = Vec::with_capacity(COLLECT_BATCH);

        loop {
            tokio::select! {
                received = results.recv_many(&mut batch, COLLECT_BATCH) => {
                    if received == 0 {
                        break;
                    }
                    let mut state = self.state.write().await;
                    match state.tests.get_mut(&test_id) {
                        Some(record) => record.results.append(&mut batch),
                        None => batch.clear(),
                    }
                }
                _ = ticker.tick() => {
                    let progress = if duration.is_zero() {
                        1.0
                    } else {
                        started.elapsed().as_secs_f64() / duration.as_secs_f64()
                    };
                    let mut state = self.state.write().await;
                    if let Some(record) = state.tests.get_mut(&test_id) {
                        record.status.advance_progress(progress);
                    }
                }
            }
        }

        debug!(test_id = %test_id, "Result channel drained");
    }

    async fn complete(&self, test_id: &str) {
        let mut state = self.state.write().await;
        let Some(record) = state.tests.get_mut(test_id) else {
            return;
        };

        let now = Utc::now();
        if record.status.status == TestState::Running {
            record.status.finish(TestState::Completed, now);
        }

        let start_time = record.status.start_time.unwrap_or(now);
        let end_time = record.status.end_time.unwrap_or(now);
        let summary = summarize(test_id, &record.config, start_time, end_time, &record.results);

        info!(
            test_id,
            status = %record.status.status,
            total_requests = summary.total_requests,
            error_rate = summary.error_rate,
            "Load test finished"
        );
        record.summary = Some(summary);
    }

    async fn fail(&self, test_id: &str, error: String) {
        let mut state = self.state.write().await;
        let Some(record) = state.tests.get_mut(test_id) else {
            return;
        };
        if record.status.finish(TestState::Failed, Utc::now()) {
            warn!(test_id, error = %error, "Load test failed");
            record.status.error = Some(error);
            record.cancel.cancel();
        }
    }
}

struct VirtualUser {
    user_id: usize,
    driver: Arc<dyn RequestDriver>,
    request: Arc<PreparedRequest>,
    results: mpsc::Sender<LoadTestResult>,
    cancel: CancellationToken,
    deadline: Instant,
    start_offset: Duration,
    request_delay: Duration,
    active_users: Arc<AtomicUsize>,
}

/// Decrements the active user count when a user's loop exits
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn virtual_user(user: VirtualUser) {
    if !user.start_offset.is_zero() {
        tokio::select! {
            biased;
            _ = user.cancel.cancelled() => return,
            _ = sleep_until(user.deadline) => return,
            _ = sleep(user.start_offset) => {}
        }
    }
    if Instant::now() >= user.deadline {
        return;
    }

    let _active = ActiveGuard::enter(user.active_users.clone());

    let mut ticker = if user.request_delay.is_zero() {
        None
    } else {
        let mut ticker = interval(user.request_delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    };

    loop {
        match ticker.as_mut() {
            Some(ticker) => {
                tokio::select! {
                    biased;
                    _ = user.cancel.cancelled() => break,
                    _ = sleep_until(user.deadline) => break,
                    _ = ticker.tick() => {}
                }
            }
            None => {
                if user.cancel.is_cancelled() || Instant::now() >= user.deadline {
                    break;
                }
                tokio::task::yield_now().await;
            }
        }

        // In-flight requests are abandoned, not recorded, once the run stops
        let result = tokio::select! {
            biased;
            _ = user.cancel.cancelled() => break,
            _ = sleep_until(user.deadline) => break,
            result = user.driver.execute(&user.request, user.user_id) => result,
        };

        if user.results.send(result).await.is_err() {
            break;
        }
    }
}

fn not_running(test_id: &str, status: TestState) -> StampedeError {
    StampedeError::InvalidState {
        id: test_id.to_string(),
        status: status.to_string(),
        message: "test not running".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    /// Driver that answers every request itself after a fixed latency
    struct FakeDriver {
        status: u16,
        latency: Duration,
        calls: AtomicU64,
    }

    impl FakeDriver {
        fn new(status: u16, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                status,
                latency,
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl RequestDriver for FakeDriver {
        async fn execute(&self, _request: &PreparedRequest, user_id: usize) -> LoadTestResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let start = Utc::now();
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }
            LoadTestResult::response(user_id, start, self.latency, self.status, 2)
        }
    }

    fn engine_with(driver: Arc<FakeDriver>) -> LoadTestEngine {
        LoadTestEngine::new(driver, EngineConfig::default()).unwrap()
    }

    fn config(users: usize, duration_ms: u64, delay_ms: u64) -> LoadTestConfig {
        LoadTestConfig::new("http://load.test/endpoint", users)
            .with_duration(Duration::from_millis(duration_ms))
            .with_request_delay(Duration::from_millis(delay_ms))
    }

    const POLL: Duration = Duration::from_millis(10);

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_with_expected_request_count() {
        let driver = FakeDriver::new(200, Duration::ZERO);
        let engine = engine_with(driver.clone());

        engine.start_load_test("run-basic", config(5, 1000, 100)).await.unwrap();
        let status = engine.wait_for_completion("run-basic", POLL).await.unwrap();

        assert_eq!(status.status, TestState::Completed);
        assert_eq!(status.progress, 1.0);
        assert!(status.end_time.is_some());

        let summary = engine.get_test_summary("run-basic").await.unwrap();
        assert_eq!(summary.total_requests, 50);
        assert_eq!(summary.error_rate, 0.0);
        assert_eq!(summary.status_codes.get(&200), Some(&50));
        assert_eq!(engine.get_test_results("run-basic").await.unwrap().len(), 50);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_id_is_conflict() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));
        engine.start_load_test("dup-id", config(1, 500, 100)).await.unwrap();
        let before = engine.get_test_status("dup-id").await.unwrap();

        let err = engine
            .start_load_test("dup-id", config(2, 500, 100))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let after = engine.get_test_status("dup-id").await.unwrap();
        assert_eq!(before.status, after.status);
        assert_eq!(before.start_time, after.start_time);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));

        let err = engine
            .start_load_test("x", config(1, 100, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StampedeError::Validation(ref v) if v.field == "test_id"));

        let err = engine
            .start_load_test("bad-users", config(0, 100, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StampedeError::Validation(ref v) if v.field == "concurrent_users"));
        assert!(engine.get_all_tests().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_run() {
        let driver = FakeDriver::new(200, Duration::from_millis(5));
        let engine = engine_with(driver.clone());

        engine.start_load_test("cancel-me", config(3, 60_000, 100)).await.unwrap();
        sleep(Duration::from_millis(550)).await;

        let metrics = engine.get_realtime_metrics("cancel-me").await.unwrap();
        assert_eq!(metrics.active_users, 3);

        engine.cancel_test("cancel-me").await.unwrap();
        let status = engine.get_test_status("cancel-me").await.unwrap();
        assert_eq!(status.status, TestState::Cancelled);
        assert_eq!(status.progress, 1.0);
        let ended = status.end_time;

        let status = engine.wait_for_completion("cancel-me", POLL).await.unwrap();
        assert_eq!(status.status, TestState::Cancelled);
        assert_eq!(status.end_time, ended);

        let calls = driver.calls.load(Ordering::SeqCst);
        assert!(calls < 30, "users kept running after cancel: {} calls", calls);
        let summary = engine.get_test_summary("cancel-me").await.unwrap();
        assert!(summary.total_requests > 0);

        // Nothing further happens once users stopped
        sleep(Duration::from_secs(2)).await;
        assert_eq!(driver.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_requires_running() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));

        assert!(engine.cancel_test("missing").await.unwrap_err().is_not_found());

        engine.start_load_test("short-run", config(1, 200, 50)).await.unwrap();
        engine.wait_for_completion("short-run", POLL).await.unwrap();
        let before = engine.get_test_status("short-run").await.unwrap();

        let err = engine.cancel_test("short-run").await.unwrap_err();
        assert!(matches!(err, StampedeError::InvalidState { ref message, .. } if message == "test not running"));
        assert_eq!(engine.get_test_status("short-run").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_cancel_pending_fails_without_mutation() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));
        {
            let mut state = engine.inner.state.write().await;
            state.tests.insert(
                "pending-test".to_string(),
                record_with(LoadTestStatus::pending("pending-test")),
            );
        }

        assert!(engine.cancel_test("pending-test").await.is_err());
        let status = engine.get_test_status("pending-test").await.unwrap();
        assert_eq!(status.status, TestState::Pending);
        assert_eq!(status.end_time, None);
        assert_eq!(status.progress, 0.0);
    }

    #[test]
    fn test_zero_progress_interval_is_rejected() {
        let config = EngineConfig {
            progress_interval: Duration::ZERO,
            ..EngineConfig::default()
        };
        let err = LoadTestEngine::new(FakeDriver::new(200, Duration::ZERO), config).unwrap_err();
        assert!(matches!(err, StampedeError::Configuration(ref m) if m.contains("progress_interval")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_failure_fails_the_run() {
        // Skips validation so the collector's ticker panics on start
        let engine_config = EngineConfig {
            progress_interval: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = LoadTestEngine::from_validated(FakeDriver::new(200, Duration::ZERO), engine_config);

        engine.start_load_test("no-collector", config(5, 1000, 100)).await.unwrap();
        let status = engine.wait_for_completion("no-collector", POLL).await.unwrap();

        assert_eq!(status.status, TestState::Failed);
        assert!(status.error.unwrap().contains("result collector stopped"));
        assert!(engine.get_test_summary("no-collector").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_failure_marks_failed() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));
        let config = config(1, 500, 100).with_header("bad header", "value");

        engine.start_load_test("setup-fails", config).await.unwrap();
        let status = engine.wait_for_completion("setup-fails", POLL).await.unwrap();

        assert_eq!(status.status, TestState::Failed);
        assert_eq!(status.progress, 1.0);
        assert!(status.end_time.is_some());
        assert!(status.error.unwrap().contains("bad header"));
        assert!(engine.get_test_summary("setup-fails").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_metrics_only_while_running() {
        let engine = engine_with(FakeDriver::new(500, Duration::ZERO));
        engine.start_load_test("rt-metrics", config(2, 2000, 100)).await.unwrap();
        sleep(Duration::from_millis(1050)).await;

        let metrics = engine.get_realtime_metrics("rt-metrics").await.unwrap();
        assert_eq!(metrics.error_rate, 100.0);
        assert!(metrics.total_requests >= 20);

        engine.wait_for_completion("rt-metrics", POLL).await.unwrap();
        assert!(engine.get_realtime_metrics("rt-metrics").await.is_err());

        // Full-run metrics stay available after completion
        let advanced = engine.get_advanced_metrics("rt-metrics").await.unwrap();
        assert_eq!(advanced.total_requests, 40);
        assert_eq!(advanced.failed_requests, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));
        engine.start_load_test("progress", config(1, 4000, 100)).await.unwrap();

        let mut last = 0.0;
        for _ in 0..6 {
            sleep(Duration::from_millis(600)).await;
            let progress = engine.get_test_status("progress").await.unwrap().progress;
            assert!(progress >= last);
            assert!(progress <= 1.0);
            last = progress;
        }
        assert!(last > 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_up_delays_users() {
        let driver = FakeDriver::new(200, Duration::ZERO);
        let engine = engine_with(driver.clone());
        let config = config(4, 1000, 100).with_ramp_up(Duration::from_millis(800));

        engine.start_load_test("ramped", config).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        let metrics = engine.get_realtime_metrics("ramped").await.unwrap();
        assert_eq!(metrics.active_users, 1);

        engine.wait_for_completion("ramped", POLL).await.unwrap();
        // Users start at 0, 200, 400 and 600ms: 10 + 8 + 6 + 4 requests
        let summary = engine.get_test_summary("ramped").await.unwrap();
        assert_eq!(summary.total_requests, 28);
    }

    fn record_with(status: LoadTestStatus) -> TestRecord {
        TestRecord {
            config: Arc::new(config(1, 100, 10)),
            status,
            results: Vec::new(),
            summary: None,
            cancel: CancellationToken::new(),
            active_users: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn finished(test_id: &str, state: TestState, ended: DateTime<Utc>) -> TestRecord {
        let mut status = LoadTestStatus::pending(test_id);
        status.mark_running(ended - chrono::Duration::minutes(1));
        status.finish(state, ended);
        record_with(status)
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_terminal_tests() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));
        let now = Utc::now();
        {
            let mut state = engine.inner.state.write().await;
            state.tests.insert(
                "old-run".to_string(),
                finished("old-run", TestState::Completed, now - chrono::Duration::hours(2)),
            );
            state.tests.insert(
                "recent-run".to_string(),
                finished("recent-run", TestState::Completed, now - chrono::Duration::minutes(10)),
            );
            let mut running = LoadTestStatus::pending("live-run");
            running.mark_running(now - chrono::Duration::hours(3));
            state.tests.insert("live-run".to_string(), record_with(running));
        }

        let removed = engine.cleanup_old_tests(Duration::from_secs(3600)).await;
        assert_eq!(removed, 1);
        assert!(engine.get_test_status("old-run").await.unwrap_err().is_not_found());
        assert!(engine.get_test_results("old-run").await.is_err());
        assert!(engine.get_test_status("recent-run").await.is_ok());
        assert!(engine.get_test_status("live-run").await.is_ok());

        // Evicted IDs stay reserved
        let err = engine
            .start_load_test("old-run", config(1, 100, 10))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_cleanup_before_cutoff() {
        let engine = engine_with(FakeDriver::new(200, Duration::ZERO));
        let now = Utc::now();
        {
            let mut state = engine.inner.state.write().await;
            state.tests.insert(
                "cancelled-run".to_string(),
                finished("cancelled-run", TestState::Cancelled, now - chrono::Duration::seconds(30)),
            );
        }

        assert_eq!(engine.cleanup_before(now - chrono::Duration::minutes(1)).await, 0);
        assert_eq!(engine.cleanup_before(now).await, 1);
        assert!(engine.get_all_tests().await.is_empty());
    }
}
