use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::EngineResult;
use crate::models::notification::{
    Channel, ChannelDelivery, NotificationIntent, SubscriptionNotification,
};
use crate::services::{database::DatabaseService, senders::Senders};

#[derive(Clone)]
pub struct Dispatcher {
    db: DatabaseService,
    senders: Senders,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(db: DatabaseService, senders: Senders, timeout: Duration) -> Self {
        Self { db, senders, timeout }
    }

    /// Persists the intent as a pending notification, then delivers it on
    /// each channel in order and stores the terminal status.
    ///
    /// Channel failures end up in the notification's deliveries; only storage
    /// errors are returned.
    pub async fn dispatch(
        &self,
        intent: NotificationIntent,
        channels: &[Channel],
        now: DateTime<Utc>,
    ) -> EngineResult<SubscriptionNotification> {
        let mut notification = SubscriptionNotification::from_intent(intent, channels.to_vec(), now);
        self.db.insert_notification(&notification).await?;

        let mut deliveries = Vec::with_capacity(notification.channels.len());
        for channel in notification.channels.clone() {
            deliveries.push(self.deliver(channel, &notification, now).await);
        }

        notification.finish(deliveries, now);
        self.db.save_notification(&notification).await?;

        log::info!(
            "Notification {} ({:?}) for tenant {} finished as {:?}",
            notification.id,
            notification.notification_type,
            notification.tenant_id,
            notification.status
        );
        Ok(notification)
    }

    async fn deliver(
        &self,
        channel: Channel,
        notification: &SubscriptionNotification,
        now: DateTime<Utc>,
    ) -> ChannelDelivery {
        let Some(sender) = self.senders.for_channel(channel) else {
            log::warn!("No sender configured for {}, notification {}", channel, notification.id);
            return ChannelDelivery::failed(channel, "no sender configured", now);
        };

        match tokio::time::timeout(self.timeout, sender.send(notification)).await {
            Ok(Ok(())) => ChannelDelivery::succeeded(channel, now),
            Ok(Err(e)) => {
                log::warn!("{} delivery of notification {} failed: {:#}", channel, notification.id, e);
                ChannelDelivery::failed(channel, e.to_string(), now)
            }
            Err(_) => {
                log::warn!(
                    "{} delivery of notification {} timed out after {:?}",
                    channel,
                    notification.id,
                    self.timeout
                );
                ChannelDelivery::failed(channel, format!("timed out after {:?}", self.timeout), now)
            }
        }
    }
}
