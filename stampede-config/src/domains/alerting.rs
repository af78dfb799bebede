//! Alerting and notification gateway configuration

use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Alerting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Cooldown applied to alerts created without one
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_cooldown"
    )]
    pub default_cooldown: Duration,

    /// Per-channel send timeout
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_notification_timeout"
    )]
    pub notification_timeout: Duration,

    /// Handlebars template for trigger messages
    #[serde(default = "default_message_template")]
    pub message_template: String,

    /// HTTP email relay used by email channels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailGatewayConfig>,

    /// HTTP SMS gateway used by sms channels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsGatewayConfig>,
}

/// Email relay API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailGatewayConfig {
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub from: String,
}

/// SMS gateway API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsGatewayConfig {
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub sender: String,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            default_cooldown: default_cooldown(),
            notification_timeout: default_notification_timeout(),
            message_template: default_message_template(),
            email: None,
            sms: None,
        }
    }
}

impl Validatable for AlertingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.notification_timeout.as_secs(),
            "notification_timeout",
            self.domain_name(),
        )?;
        validate_required_string(&self.message_template, "message_template", self.domain_name())?;

        if let Some(ref email) = self.email {
            validate_http_url(&email.api_url, "email.api_url", self.domain_name())?;
            validate_required_string(&email.from, "email.from", self.domain_name())?;
        }

        if let Some(ref sms) = self.sms {
            validate_http_url(&sms.api_url, "sms.api_url", self.domain_name())?;
            validate_required_string(&sms.sender, "sms.sender", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "alerting"
    }
}

fn default_cooldown() -> Duration {
    Duration::from_secs(300)
}

fn default_notification_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn default_message_template() -> String {
    "Alert '{{alert_name}}' triggered for test {{test_id}}: {{metric}} is {{value}} ({{operator}} {{threshold}})"
        .to_string()
}
