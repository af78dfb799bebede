//! Channel sender abstraction

use async_trait::async_trait;
use stampede_core::{ChannelType, NotificationChannel};

use crate::errors::NotifyError;
use crate::message::AlertMessage;

/// Delivers alert messages over one kind of channel
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Channel kind this sender handles
    fn channel_type(&self) -> ChannelType;

    /// Send one message using the channel's own settings
    async fn send(
        &self,
        channel: &NotificationChannel,
        message: &AlertMessage,
    ) -> Result<(), NotifyError>;
}

/// Send a prepared request and treat any non-2xx answer as a rejection
pub(crate) async fn deliver(
    channel: ChannelType,
    request: reqwest::RequestBuilder,
) -> Result<(), NotifyError> {
    let response = request.send().await.map_err(|e| NotifyError::Network {
        channel,
        error: e.to_string(),
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let response = response.text().await.unwrap_or_default();
    Err(NotifyError::Rejected {
        channel,
        status: status.as_u16(),
        response,
    })
}

pub(crate) fn wrong_channel(expected: ChannelType, got: &NotificationChannel) -> NotifyError {
    NotifyError::InvalidChannel {
        channel: expected,
        message: format!("received {} channel settings", got.channel_type()),
    }
}
