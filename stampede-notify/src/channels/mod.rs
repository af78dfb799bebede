//! Concrete channel senders

pub mod email;
pub mod slack;
pub mod sms;
pub mod webhook;

pub use email::EmailSender;
pub use slack::SlackSender;
pub use sms::SmsSender;
pub use webhook::WebhookSender;
