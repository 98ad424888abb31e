use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::notification::SubscriptionNotification;
use crate::services::database::DatabaseService;

/// Read side of persisted notifications, newest first.
#[derive(Clone)]
pub struct NotificationFeed {
    db: DatabaseService,
}

impl NotificationFeed {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    pub async fn list_notifications(&self, tenant_id: Option<Uuid>) -> EngineResult<Vec<SubscriptionNotification>> {
        let mut notifications: Vec<SubscriptionNotification> = self
            .db
            .list_notifications()
            .await?
            .into_iter()
            .filter(|notification| tenant_id.map_or(true, |id| notification.tenant_id == id))
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn unread_notifications(&self) -> EngineResult<Vec<SubscriptionNotification>> {
        Ok(self
            .list_notifications(None)
            .await?
            .into_iter()
            .filter(|notification| !notification.read)
            .collect())
    }

    /// Only `read` changes; status and content stay as delivered.
    pub async fn mark_as_read(&self, notification_id: Uuid) -> EngineResult<SubscriptionNotification> {
        let mut notification = self
            .db
            .get_notification(&notification_id)
            .await?
            .ok_or(EngineError::NotificationNotFound(notification_id))?;

        if !notification.read {
            notification.read = true;
            self.db.save_notification(&notification).await?;
        }
        Ok(notification)
    }

    pub async fn mark_all_as_read(&self) -> EngineResult<usize> {
        let mut marked = 0;
        for mut notification in self.unread_notifications().await? {
            notification.read = true;
            self.db.save_notification(&notification).await?;
            marked += 1;
        }
        Ok(marked)
    }
}
