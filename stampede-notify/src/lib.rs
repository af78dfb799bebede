//! # Stampede notifications
//!
//! Delivers fired alerts over the channels attached to them. Each channel
//! type has a [`NotificationSender`]; the [`NotificationDispatcher`] attempts
//! every active channel of an alert and reports per-channel failures without
//! letting one failure stop the others. Delivery is best effort: there are no
//! retries.

pub mod channels;
pub mod dispatcher;
pub mod errors;
pub mod message;
pub mod metrics;
pub mod sender;
pub mod template;

pub use channels::{EmailSender, SlackSender, SmsSender, WebhookSender};
pub use dispatcher::{AlertNotifier, ChannelFailure, DispatchReport, NotificationDispatcher};
pub use errors::NotifyError;
pub use message::AlertMessage;
pub use metrics::{AggregateMetrics, ChannelMetrics, DeliveryMetrics};
pub use sender::NotificationSender;
pub use template::TemplateEngine;
