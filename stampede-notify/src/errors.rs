//! Notification error types

use stampede_core::ChannelType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{channel} request failed: {error}")]
    Network { channel: ChannelType, error: String },

    #[error("{channel} endpoint returned {status}: {response}")]
    Rejected {
        channel: ChannelType,
        status: u16,
        response: String,
    },

    #[error("no {0} gateway configured")]
    MissingGateway(ChannelType),

    #[error("no sender registered for {0} channels")]
    NoSender(ChannelType),

    #[error("invalid {channel} channel: {message}")]
    InvalidChannel {
        channel: ChannelType,
        message: String,
    },

    #[error("failed to render template '{template}': {error}")]
    TemplateRender { template: String, error: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
