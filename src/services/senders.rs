use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SenderConfig;
use crate::models::notification::{Channel, SubscriptionNotification};
use crate::utils::signature;

/// Delivery capability for one channel. Transport lives outside the engine;
/// an `Ok` means the external side accepted the message.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, notification: &SubscriptionNotification) -> Result<()>;
}

/// One optional sender per channel.
#[derive(Clone, Default)]
pub struct Senders {
    sms: Option<Arc<dyn Sender>>,
    email: Option<Arc<dyn Sender>>,
    in_app: Option<Arc<dyn Sender>>,
}

impl Senders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Channel, sender: Arc<dyn Sender>) -> Self {
        match channel {
            Channel::Sms => self.sms = Some(sender),
            Channel::Email => self.email = Some(sender),
            Channel::InApp => self.in_app = Some(sender),
        }
        self
    }

    pub fn for_channel(&self, channel: Channel) -> Option<&Arc<dyn Sender>> {
        match channel {
            Channel::Sms => self.sms.as_ref(),
            Channel::Email => self.email.as_ref(),
            Channel::InApp => self.in_app.as_ref(),
        }
    }

    /// In-app delivery is always available; SMS and email only when a
    /// gateway URL is configured.
    pub fn from_config(config: &SenderConfig) -> Self {
        let client = Client::new();
        let mut senders = Senders::new().with(Channel::InApp, Arc::new(InAppSender));

        if let Some(url) = &config.sms_gateway_url {
            senders = senders.with(
                Channel::Sms,
                Arc::new(GatewaySender::new(client.clone(), Channel::Sms, url.clone(), config.signing_secret.clone())),
            );
        } else {
            log::warn!("SMS_GATEWAY_URL not set, sms notifications will fail");
        }

        if let Some(url) = &config.email_gateway_url {
            senders = senders.with(
                Channel::Email,
                Arc::new(GatewaySender::new(client, Channel::Email, url.clone(), config.signing_secret.clone())),
            );
        } else {
            log::warn!("EMAIL_GATEWAY_URL not set, email notifications will fail");
        }

        senders
    }
}

/// The persisted notification is the in-app feed entry itself.
pub struct InAppSender;

#[async_trait]
impl Sender for InAppSender {
    async fn send(&self, notification: &SubscriptionNotification) -> Result<()> {
        log::debug!("In-app notification {} ready for {}", notification.id, notification.admin_id);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayMessage<'a> {
    notification_id: Uuid,
    tenant_id: Uuid,
    channel: Channel,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Hands messages to an external SMS/email relay over HTTP. The JSON body is
/// signed with HMAC-SHA256 in the `X-Signature` header.
pub struct GatewaySender {
    client: Client,
    channel: Channel,
    endpoint: String,
    signing_secret: String,
}

impl GatewaySender {
    pub fn new(client: Client, channel: Channel, endpoint: String, signing_secret: String) -> Self {
        Self {
            client,
            channel,
            endpoint,
            signing_secret,
        }
    }

    fn recipient<'a>(&self, notification: &'a SubscriptionNotification) -> Option<&'a str> {
        match self.channel {
            Channel::Sms => Some(notification.admin_phone.as_str()).filter(|phone| !phone.is_empty()),
            Channel::Email => notification.admin_email.as_deref(),
            Channel::InApp => Some(notification.admin_id.as_str()),
        }
    }

    fn build_payload(&self, notification: &SubscriptionNotification) -> Result<Vec<u8>> {
        let to = self
            .recipient(notification)
            .ok_or_else(|| anyhow!("No {} address for {}", self.channel, notification.admin_name))?;

        let message = GatewayMessage {
            notification_id: notification.id,
            tenant_id: notification.tenant_id,
            channel: self.channel,
            to,
            subject: &notification.title,
            body: &notification.message,
        };
        Ok(serde_json::to_vec(&message)?)
    }
}

#[async_trait]
impl Sender for GatewaySender {
    async fn send(&self, notification: &SubscriptionNotification) -> Result<()> {
        let payload = self.build_payload(notification)?;
        let signature = signature::sign(&self.signing_secret, &payload)?;

        log::debug!("Posting {} notification {} to {}", self.channel, notification.id, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("X-Signature", signature)
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gateway rejected {} message ({}): {}", self.channel, status, error_text));
        }

        Ok(())
    }
}
