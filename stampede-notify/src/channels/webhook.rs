//! Generic JSON webhook delivery

use async_trait::async_trait;
use stampede_core::{ChannelType, HttpMethod, NotificationChannel};
use stampede_http::to_reqwest_method;

use crate::errors::NotifyError;
use crate::message::AlertMessage;
use crate::sender::{deliver, wrong_channel, NotificationSender};

#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Webhook
    }

    async fn send(
        &self,
        channel: &NotificationChannel,
        message: &AlertMessage,
    ) -> Result<(), NotifyError> {
        let NotificationChannel::Webhook {
            url,
            method,
            headers,
        } = channel
        else {
            return Err(wrong_channel(ChannelType::Webhook, channel));
        };

        let mut request = self.client.request(to_reqwest_method(*method), url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        // GET and DELETE hooks carry no body
        if !matches!(method, HttpMethod::Get | HttpMethod::Delete) {
            request = request.json(&message.json_payload());
        }

        deliver(ChannelType::Webhook, request).await
    }
}
