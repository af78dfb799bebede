//! Slack incoming webhook delivery

use async_trait::async_trait;
use serde_json::json;
use stampede_core::{ChannelType, NotificationChannel};

use crate::errors::NotifyError;
use crate::message::AlertMessage;
use crate::sender::{deliver, wrong_channel, NotificationSender};

#[derive(Debug, Clone)]
pub struct SlackSender {
    client: reqwest::Client,
}

impl SlackSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Slack
    }

    async fn send(
        &self,
        channel: &NotificationChannel,
        message: &AlertMessage,
    ) -> Result<(), NotifyError> {
        let NotificationChannel::Slack {
            webhook_url,
            channel: slack_channel,
            username,
        } = channel
        else {
            return Err(wrong_channel(ChannelType::Slack, channel));
        };

        let mut payload = json!({
            "text": message.markdown(),
            "mrkdwn": true,
        });
        if let Some(slack_channel) = slack_channel {
            payload["channel"] = json!(slack_channel);
        }
        if let Some(username) = username {
            payload["username"] = json!(username);
        }

        deliver(ChannelType::Slack, self.client.post(webhook_url).json(&payload)).await
    }
}
