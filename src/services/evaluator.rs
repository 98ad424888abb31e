//! Expiry evaluation.
//!
//! `evaluate` decides which notifications are due for a snapshot of tenants,
//! settings and notification history at a given instant. It touches no
//! storage; the engine applies its result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{
    notification::{NotificationIntent, NotificationType, SubscriptionNotification},
    settings::NotificationSettings,
    tenant::{Tenant, TenantStatus},
};

pub const AUTO_SUSPEND_REASON: &str = "subscription expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    AlreadyCheckedToday,
}

#[derive(Debug, Default)]
pub struct Evaluation {
    pub skipped: Option<SkipReason>,
    pub evaluated: usize,
    pub intents: Vec<NotificationIntent>,
    /// Tenants to suspend before dispatching, in evaluation order.
    pub suspensions: Vec<Uuid>,
}

impl Evaluation {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Identity of a notification event for deduplication.
///
/// `expired` is a one-time event, so its day count is not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    tenant_id: Uuid,
    notification_type: NotificationType,
    days_until_expiry: Option<i64>,
}

impl DedupKey {
    pub fn new(tenant_id: Uuid, notification_type: NotificationType, days_until_expiry: i64) -> Self {
        let days_until_expiry = match notification_type {
            NotificationType::Expired => None,
            _ => Some(days_until_expiry),
        };
        Self {
            tenant_id,
            notification_type,
            days_until_expiry,
        }
    }

    pub fn of(notification: &SubscriptionNotification) -> Self {
        Self::new(
            notification.tenant_id,
            notification.notification_type,
            notification.days_until_expiry,
        )
    }
}

/// Keys of every notification that reached `sent`.
pub fn sent_keys(history: &[SubscriptionNotification]) -> HashSet<DedupKey> {
    history
        .iter()
        .filter(|notification| notification.is_sent())
        .map(DedupKey::of)
        .collect()
}

pub fn classify(days_until_expiry: i64, settings: &NotificationSettings) -> Option<NotificationType> {
    if days_until_expiry < 0 {
        Some(NotificationType::Expired)
    } else if settings.is_warning_day(days_until_expiry) {
        Some(NotificationType::ExpiryWarning)
    } else {
        None
    }
}

/// `force` bypasses the once-per-day guard (manual refresh); deduplication
/// against sent history still applies.
pub fn evaluate(
    tenants: &[Tenant],
    settings: &NotificationSettings,
    history: &[SubscriptionNotification],
    now: DateTime<Utc>,
    force: bool,
) -> Evaluation {
    if !settings.enabled {
        return Evaluation::skipped(SkipReason::Disabled);
    }
    if !force && settings.checked_on_same_day(now) {
        return Evaluation::skipped(SkipReason::AlreadyCheckedToday);
    }

    let sent = sent_keys(history);
    let mut evaluation = Evaluation::default();

    for tenant in tenants.iter().filter(|tenant| tenant.status == TenantStatus::Active) {
        evaluation.evaluated += 1;

        let days = tenant.days_until_expiry(now);
        let Some(notification_type) = classify(days, settings) else {
            continue;
        };

        if sent.contains(&DedupKey::new(tenant.id, notification_type, days)) {
            log::debug!(
                "Tenant {} already notified ({:?}, {} days)",
                tenant.id,
                notification_type,
                days
            );
            continue;
        }

        if notification_type == NotificationType::Expired && settings.auto_suspend_on_expiry {
            evaluation.suspensions.push(tenant.id);
        }
        evaluation
            .intents
            .push(NotificationIntent::for_tenant(tenant, notification_type, days));
    }

    evaluation
}
