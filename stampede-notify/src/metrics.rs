//! Delivery counters per channel type

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stampede_core::ChannelType;
use tokio::sync::RwLock;

/// Counters for one channel type
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    pub total_deliveries: AtomicU64,
    pub successful_deliveries: AtomicU64,
    pub failed_deliveries: AtomicU64,
    pub total_delivery_time: AtomicU64, // in milliseconds
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, delivery_time: Duration) {
        self.total_deliveries.fetch_add(1, Ordering::Relaxed);
        self.successful_deliveries.fetch_add(1, Ordering::Relaxed);
        self.total_delivery_time
            .fetch_add(delivery_time.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, delivery_time: Duration) {
        self.total_deliveries.fetch_add(1, Ordering::Relaxed);
        self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
        self.total_delivery_time
            .fetch_add(delivery_time.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        (self.success_count() as f64 / total as f64) * 100.0
    }

    pub fn average_delivery_time(&self) -> Duration {
        let total = self.total_count();
        if total == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.total_delivery_time.load(Ordering::Relaxed) / total)
    }

    pub fn total_count(&self) -> u64 {
        self.total_deliveries.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.successful_deliveries.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failed_deliveries.load(Ordering::Relaxed)
    }
}

/// Delivery metrics for all channel types
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    channels: RwLock<HashMap<ChannelType, Arc<ChannelMetrics>>>,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, channel: ChannelType, delivery_time: Duration) {
        self.channel(channel).await.record_success(delivery_time);
    }

    pub async fn record_failure(&self, channel: ChannelType, delivery_time: Duration) {
        self.channel(channel).await.record_failure(delivery_time);
    }

    async fn channel(&self, channel: ChannelType) -> Arc<ChannelMetrics> {
        if let Some(metrics) = self.channels.read().await.get(&channel) {
            return metrics.clone();
        }
        self.channels
            .write()
            .await
            .entry(channel)
            .or_insert_with(|| Arc::new(ChannelMetrics::new()))
            .clone()
    }

    pub async fn get_channel_metrics(&self, channel: ChannelType) -> Option<Arc<ChannelMetrics>> {
        self.channels.read().await.get(&channel).cloned()
    }

    pub async fn get_aggregate_metrics(&self) -> AggregateMetrics {
        let channels = self.channels.read().await;
        let mut aggregate = AggregateMetrics::default();

        for metrics in channels.values() {
            aggregate.total_deliveries += metrics.total_count();
            aggregate.successful_deliveries += metrics.success_count();
            aggregate.failed_deliveries += metrics.failure_count();
        }

        aggregate
    }

    pub async fn reset(&self) {
        self.channels.write().await.clear();
    }
}

/// Aggregate metrics across all channel types
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub total_deliveries: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
}

impl AggregateMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_deliveries == 0 {
            return 0.0;
        }
        (self.successful_deliveries as f64 / self.total_deliveries as f64) * 100.0
    }
}
