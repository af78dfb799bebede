//! Email delivery through an HTTP mail relay

use async_trait::async_trait;
use serde_json::json;
use stampede_config::EmailGatewayConfig;
use stampede_core::{ChannelType, NotificationChannel};

use crate::errors::NotifyError;
use crate::message::AlertMessage;
use crate::sender::{deliver, wrong_channel, NotificationSender};

/// Sends plain text email via the configured relay API
#[derive(Debug, Clone)]
pub struct EmailSender {
    client: reqwest::Client,
    gateway: Option<EmailGatewayConfig>,
}

impl EmailSender {
    pub fn new(client: reqwest::Client, gateway: Option<EmailGatewayConfig>) -> Self {
        Self { client, gateway }
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Email
    }

    async fn send(
        &self,
        channel: &NotificationChannel,
        message: &AlertMessage,
    ) -> Result<(), NotifyError> {
        let NotificationChannel::Email { recipients, subject } = channel else {
            return Err(wrong_channel(ChannelType::Email, channel));
        };
        if recipients.is_empty() {
            return Err(NotifyError::InvalidChannel {
                channel: ChannelType::Email,
                message: "no recipients".to_string(),
            });
        }
        let gateway = self
            .gateway
            .as_ref()
            .ok_or(NotifyError::MissingGateway(ChannelType::Email))?;

        let payload = json!({
            "from": gateway.from,
            "to": recipients,
            "subject": subject.clone().unwrap_or_else(|| message.subject()),
            "text": message.plain_text(),
        });

        let mut request = self.client.post(&gateway.api_url).json(&payload);
        if let Some(api_key) = &gateway.api_key {
            request = request.bearer_auth(api_key);
        }

        deliver(ChannelType::Email, request).await
    }
}
