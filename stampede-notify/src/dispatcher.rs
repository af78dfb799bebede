//! Fan-out of one alert firing to every active channel

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use stampede_config::AlertingConfig;
use stampede_core::{Alert, AlertTrigger, ChannelType, Notification, NotificationId};
use tracing::{debug, info, warn};

use crate::channels::{EmailSender, SlackSender, SmsSender, WebhookSender};
use crate::errors::NotifyError;
use crate::message::AlertMessage;
use crate::metrics::DeliveryMetrics;
use crate::sender::NotificationSender;

/// Receives every alert firing. Implementations must not fail the caller:
/// delivery problems are reported, not returned as errors.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert, trigger: &AlertTrigger) -> DispatchReport;
}

/// One channel that could not be reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelFailure {
    pub notification_id: NotificationId,
    pub channel: ChannelType,
    pub error: String,
}

/// Outcome of delivering one firing to all of an alert's active channels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: Vec<NotificationId>,
    pub failures: Vec<ChannelFailure>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Routes each notification to the sender for its channel type
pub struct NotificationDispatcher {
    senders: HashMap<ChannelType, Arc<dyn NotificationSender>>,
    metrics: DeliveryMetrics,
}

impl NotificationDispatcher {
    /// Dispatcher with no senders registered
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
            metrics: DeliveryMetrics::new(),
        }
    }

    /// Dispatcher with all four channel types, sharing one HTTP client
    pub fn from_config(config: &AlertingConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.notification_timeout)
            .user_agent(concat!("stampede-notify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self::new()
            .with_sender(Arc::new(EmailSender::new(client.clone(), config.email.clone())))
            .with_sender(Arc::new(SlackSender::new(client.clone())))
            .with_sender(Arc::new(WebhookSender::new(client.clone())))
            .with_sender(Arc::new(SmsSender::new(client, config.sms.clone()))))
    }

    /// Register a sender, replacing any existing one for the same channel type
    pub fn with_sender(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.senders.insert(sender.channel_type(), sender);
        self
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    /// Attempt every active notification concurrently. A failing channel
    /// never prevents the others from being tried.
    pub async fn dispatch(
        &self,
        notifications: &[Notification],
        message: &AlertMessage,
    ) -> DispatchReport {
        let attempts = notifications
            .iter()
            .filter(|notification| notification.is_active)
            .map(|notification| async move {
                let started = Instant::now();
                let channel = notification.channel_type();
                let outcome = match self.senders.get(&channel) {
                    Some(sender) => sender.send(&notification.channel, message).await,
                    None => Err(NotifyError::NoSender(channel)),
                };
                (notification, outcome, started.elapsed())
            });

        let outcomes = join_all(attempts).await;

        let mut report = DispatchReport {
            attempted: outcomes.len(),
            ..DispatchReport::default()
        };

        for (notification, outcome, elapsed) in outcomes {
            let channel = notification.channel_type();
            match outcome {
                Ok(()) => {
                    self.metrics.record_success(channel, elapsed).await;
                    debug!(
                        alert_id = %message.alert_id,
                        channel = %channel,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Notification delivered"
                    );
                    report.delivered.push(notification.id);
                }
                Err(e) => {
                    self.metrics.record_failure(channel, elapsed).await;
                    warn!(
                        alert_id = %message.alert_id,
                        channel = %channel,
                        error = %e,
                        "Notification delivery failed"
                    );
                    report.failures.push(ChannelFailure {
                        notification_id: notification.id,
                        channel,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.attempted > 0 {
            info!(
                alert_id = %message.alert_id,
                attempted = report.attempted,
                delivered = report.delivered.len(),
                failed = report.failures.len(),
                "Alert notifications dispatched"
            );
        }

        report
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertNotifier for NotificationDispatcher {
    async fn notify(&self, alert: &Alert, trigger: &AlertTrigger) -> DispatchReport {
        let message = AlertMessage::new(alert, trigger);
        self.dispatch(&alert.notifications, &message).await
    }
}
