use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::tenant::Tenant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
    InApp,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::Email => write!(f, "email"),
            Channel::InApp => write!(f, "in_app"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "sms" => Ok(Channel::Sms),
            "email" => Ok(Channel::Email),
            "in_app" | "inapp" => Ok(Channel::InApp),
            other => Err(format!("Unknown notification channel: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ExpiryWarning,
    Expired,
    Suspended,
    Renewed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

/// Outcome of one channel's delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDelivery {
    pub channel: Channel,
    pub succeeded: bool,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl ChannelDelivery {
    pub fn succeeded(channel: Channel, attempted_at: DateTime<Utc>) -> Self {
        Self {
            channel,
            succeeded: true,
            error: None,
            attempted_at,
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>, attempted_at: DateTime<Utc>) -> Self {
        Self {
            channel,
            succeeded: false,
            error: Some(error.into()),
            attempted_at,
        }
    }
}

/// A notification event decided by the evaluator (or an admin action) that
/// has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationIntent {
    pub tenant_id: Uuid,
    pub store_name: String,
    pub admin_id: String,
    pub admin_name: String,
    pub admin_phone: String,
    pub admin_email: Option<String>,
    pub notification_type: NotificationType,
    pub days_until_expiry: i64,
}

impl NotificationIntent {
    pub fn for_tenant(tenant: &Tenant, notification_type: NotificationType, days_until_expiry: i64) -> Self {
        Self {
            tenant_id: tenant.id,
            store_name: tenant.store_name.clone(),
            admin_id: tenant.owner.id.clone(),
            admin_name: tenant.owner.name.clone(),
            admin_phone: tenant.owner.phone.clone(),
            admin_email: tenant.owner.email.clone(),
            notification_type,
            days_until_expiry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionNotification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub admin_id: String,
    pub admin_name: String,
    pub admin_phone: String,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub days_until_expiry: i64,
    pub channels: Vec<Channel>,
    pub status: NotificationStatus,
    #[serde(default)]
    pub deliveries: Vec<ChannelDelivery>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

impl SubscriptionNotification {
    pub fn from_intent(intent: NotificationIntent, channels: Vec<Channel>, now: DateTime<Utc>) -> Self {
        let (title, message) = compose(&intent);
        Self {
            id: Uuid::new_v4(),
            tenant_id: intent.tenant_id,
            admin_id: intent.admin_id,
            admin_name: intent.admin_name,
            admin_phone: intent.admin_phone,
            admin_email: intent.admin_email,
            notification_type: intent.notification_type,
            title,
            message,
            days_until_expiry: intent.days_until_expiry,
            channels,
            status: NotificationStatus::Pending,
            deliveries: Vec::new(),
            created_at: now,
            sent_at: None,
            read: false,
        }
    }

    /// Records the delivery outcomes and settles the terminal status.
    /// Sent only when at least one channel was attempted and every one
    /// succeeded.
    pub fn finish(&mut self, deliveries: Vec<ChannelDelivery>, now: DateTime<Utc>) {
        let all_succeeded = !deliveries.is_empty() && deliveries.iter().all(|delivery| delivery.succeeded);
        self.deliveries = deliveries;
        if all_succeeded {
            self.status = NotificationStatus::Sent;
            self.sent_at = Some(now);
        } else {
            self.status = NotificationStatus::Failed;
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == NotificationStatus::Sent
    }
}

fn compose(intent: &NotificationIntent) -> (String, String) {
    let store = &intent.store_name;
    let days = intent.days_until_expiry;
    match intent.notification_type {
        NotificationType::ExpiryWarning => {
            let when = match days {
                0 => "today".to_string(),
                1 => "tomorrow".to_string(),
                n => format!("in {} days", n),
            };
            (
                "Subscription expiring soon".to_string(),
                format!(
                    "Hi {}, the subscription for {} expires {}. Renew now to avoid interruption.",
                    intent.admin_name, store, when
                ),
            )
        }
        NotificationType::Expired => {
            let overdue = days.unsigned_abs();
            (
                "Subscription expired".to_string(),
                format!(
                    "Hi {}, the subscription for {} expired {} day{} ago. Renew to restore full access.",
                    intent.admin_name,
                    store,
                    overdue,
                    if overdue == 1 { "" } else { "s" }
                ),
            )
        }
        NotificationType::Suspended => (
            "Account suspended".to_string(),
            format!(
                "Hi {}, the account for {} has been suspended. Contact support to reactivate it.",
                intent.admin_name, store
            ),
        ),
        NotificationType::Renewed => (
            "Subscription renewed".to_string(),
            format!(
                "Hi {}, the subscription for {} has been renewed. Thank you!",
                intent.admin_name, store
            ),
        ),
    }
}
