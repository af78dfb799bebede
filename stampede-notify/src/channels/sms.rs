//! SMS delivery through an HTTP gateway

use async_trait::async_trait;
use serde_json::json;
use stampede_config::SmsGatewayConfig;
use stampede_core::{ChannelType, NotificationChannel};

use crate::errors::NotifyError;
use crate::message::AlertMessage;
use crate::sender::{deliver, wrong_channel, NotificationSender};

#[derive(Debug, Clone)]
pub struct SmsSender {
    client: reqwest::Client,
    gateway: Option<SmsGatewayConfig>,
}

impl SmsSender {
    pub fn new(client: reqwest::Client, gateway: Option<SmsGatewayConfig>) -> Self {
        Self { client, gateway }
    }
}

#[async_trait]
impl NotificationSender for SmsSender {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Sms
    }

    async fn send(
        &self,
        channel: &NotificationChannel,
        message: &AlertMessage,
    ) -> Result<(), NotifyError> {
        let NotificationChannel::Sms { phone_numbers } = channel else {
            return Err(wrong_channel(ChannelType::Sms, channel));
        };
        if phone_numbers.is_empty() {
            return Err(NotifyError::InvalidChannel {
                channel: ChannelType::Sms,
                message: "no phone numbers".to_string(),
            });
        }
        let gateway = self
            .gateway
            .as_ref()
            .ok_or(NotifyError::MissingGateway(ChannelType::Sms))?;

        let payload = json!({
            "from": gateway.sender,
            "to": phone_numbers,
            "body": message.short_text(),
        });

        let mut request = self.client.post(&gateway.api_url).json(&payload);
        if let Some(api_key) = &gateway.api_key {
            request = request.bearer_auth(api_key);
        }

        deliver(ChannelType::Sms, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::tests::sample_message;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sms_gateway_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "from": "STAMPEDE",
                "to": ["+15550100", "+15550101"],
                "body": "[HIGH] High error rate: error_rate 12.50 > 5",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = SmsSender::new(
            reqwest::Client::new(),
            Some(SmsGatewayConfig {
                api_url: server.uri(),
                api_key: None,
                sender: "STAMPEDE".to_string(),
            }),
        );
        let channel = NotificationChannel::Sms {
            phone_numbers: vec!["+15550100".to_string(), "+15550101".to_string()],
        };
        sender.send(&channel, &sample_message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_sms_requires_numbers() {
        let sender = SmsSender::new(reqwest::Client::new(), None);
        let channel = NotificationChannel::Sms {
            phone_numbers: Vec::new(),
        };
        assert!(matches!(
            sender.send(&channel, &sample_message()).await,
            Err(NotifyError::InvalidChannel { .. })
        ));
    }
}
