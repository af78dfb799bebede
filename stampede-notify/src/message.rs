//! The alert payload handed to every channel, and its per-channel renderings

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use stampede_core::{Alert, AlertId, AlertTrigger, ComparisonOperator, Severity, TriggerId};

/// Maximum length of an SMS body
const SMS_MAX_CHARS: usize = 160;

/// One alert firing, as seen by notification channels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub alert_id: AlertId,
    pub trigger_id: TriggerId,
    pub alert_name: String,
    pub test_id: String,
    pub metric: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub value: f64,
    pub severity: Severity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

impl AlertMessage {
    pub fn new(alert: &Alert, trigger: &AlertTrigger) -> Self {
        Self {
            alert_id: alert.id,
            trigger_id: trigger.id,
            alert_name: alert.name.clone(),
            test_id: trigger.test_id.clone(),
            metric: alert.metric.clone(),
            operator: alert.operator,
            threshold: trigger.threshold,
            value: trigger.value,
            severity: alert.severity,
            message: trigger.message.clone(),
            triggered_at: trigger.triggered_at,
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "[{}] Load test alert: {}",
            self.severity.as_str().to_uppercase(),
            self.alert_name
        )
    }

    /// Plain text body for email
    pub fn plain_text(&self) -> String {
        format!(
            "{message}\n\n\
             Alert:     {name}\n\
             Test:      {test}\n\
             Severity:  {severity}\n\
             Condition: {metric} {operator} {threshold}\n\
             Value:     {value:.2}\n\
             Time:      {time}\n",
            message = self.message,
            name = self.alert_name,
            test = self.test_id,
            severity = self.severity,
            metric = self.metric,
            operator = self.operator,
            threshold = self.threshold,
            value = self.value,
            time = self.triggered_at.to_rfc3339(),
        )
    }

    /// Slack mrkdwn body
    pub fn markdown(&self) -> String {
        format!(
            "{emoji} *{name}* ({severity})\n{message}\n\
             • *Test:* `{test}`\n\
             • *Condition:* `{metric} {operator} {threshold}`\n\
             • *Value:* `{value:.2}`",
            emoji = severity_emoji(self.severity),
            name = self.alert_name,
            severity = self.severity,
            message = self.message,
            test = self.test_id,
            metric = self.metric,
            operator = self.operator,
            threshold = self.threshold,
            value = self.value,
        )
    }

    /// Structured payload for generic webhooks
    pub fn json_payload(&self) -> Value {
        json!({
            "event": "alert.triggered",
            "alert_id": self.alert_id,
            "trigger_id": self.trigger_id,
            "alert_name": self.alert_name,
            "test_id": self.test_id,
            "metric": self.metric,
            "operator": self.operator,
            "threshold": self.threshold,
            "value": self.value,
            "severity": self.severity,
            "message": self.message,
            "triggered_at": self.triggered_at,
        })
    }

    /// Short text that fits in one SMS
    pub fn short_text(&self) -> String {
        let text = format!(
            "[{}] {}: {} {:.2} {} {}",
            self.severity.as_str().to_uppercase(),
            self.alert_name,
            self.metric,
            self.value,
            self.operator,
            self.threshold
        );
        if text.chars().count() <= SMS_MAX_CHARS {
            text
        } else {
            let mut truncated: String = text.chars().take(SMS_MAX_CHARS - 3).collect();
            truncated.push_str("...");
            truncated
        }
    }
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => ":information_source:",
        Severity::Medium => ":warning:",
        Severity::High => ":rotating_light:",
        Severity::Critical => ":fire:",
    }
}
