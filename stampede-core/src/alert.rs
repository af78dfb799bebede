//! Alert domain model: alerts, triggers, templates and notification channels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::types::{ComparisonOperator, HttpMethod, Severity};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map($name)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                $name(uuid)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an alert
    AlertId
);
uuid_id!(
    /// Unique identifier for one firing of an alert
    TriggerId
);
uuid_id!(
    /// Unique identifier for an alert template
    TemplateId
);
uuid_id!(
    /// Unique identifier for a notification channel attached to an alert
    NotificationId
);

/// Threshold alert scoped to one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub test_id: String,
    pub name: String,
    pub condition: String,
    pub threshold: f64,
    pub operator: ComparisonOperator,
    pub metric: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_triggered: Option<DateTime<Utc>>,
    pub trigger_count: u64,
    pub notifications: Vec<Notification>,
    #[serde(with = "humantime_serde")]
    pub cooldown_period: Duration,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Alert {
    /// Whether the alert is still cooling down from its last firing at `now`
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_triggered else {
            return false;
        };
        match (now - last).to_std() {
            Ok(elapsed) => elapsed < self.cooldown_period,
            // Clock went backwards, treat as still cooling down
            Err(_) => true,
        }
    }
}

/// Record of one alert firing. Append-only apart from resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTrigger {
    pub id: TriggerId,
    pub alert_id: AlertId,
    pub test_id: String,
    pub triggered_at: DateTime<Utc>,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub is_resolved: bool,
}

/// Reusable preset for alert conditions, not bound to a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub condition: String,
    pub threshold: f64,
    pub operator: ComparisonOperator,
    pub metric: String,
    #[serde(with = "humantime_serde")]
    pub cooldown_period: Duration,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A delivery channel attached to an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: NotificationId,
    #[serde(flatten)]
    pub channel: NotificationChannel,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Notification {
    pub fn new(channel: NotificationChannel) -> Self {
        Self {
            id: NotificationId::new(),
            channel,
            is_active: true,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel.channel_type()
    }
}

fn default_true() -> bool {
    true
}

/// Channel-specific notification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationChannel {
    Email {
        recipients: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    },
    Slack {
        webhook_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    Webhook {
        url: String,
        #[serde(default = "default_webhook_method")]
        method: HttpMethod,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Sms {
        phone_numbers: Vec<String>,
    },
}

fn default_webhook_method() -> HttpMethod {
    HttpMethod::Post
}

impl NotificationChannel {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            NotificationChannel::Email { .. } => ChannelType::Email,
            NotificationChannel::Slack { .. } => ChannelType::Slack,
            NotificationChannel::Webhook { .. } => ChannelType::Webhook,
            NotificationChannel::Sms { .. } => ChannelType::Sms,
        }
    }
}

/// Notification channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Slack,
    Webhook,
    Sms,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Slack => "slack",
            ChannelType::Webhook => "webhook",
            ChannelType::Sms => "sms",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
