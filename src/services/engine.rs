use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{
    notification::{Channel, NotificationIntent, NotificationStatus, NotificationType},
    settings::{NotificationSettings, UpdateSettingsRequest},
    tenant::{Tenant, UpdateTenantRequest},
};
use crate::services::{
    database::DatabaseService,
    dispatcher::Dispatcher,
    evaluator::{self, DedupKey, Evaluation, SkipReason, AUTO_SUSPEND_REASON},
    notifications::NotificationFeed,
    senders::Senders,
    settings::SettingsStore,
    tenants::TenantService,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub checked_at: DateTime<Utc>,
    pub skipped: Option<SkipReason>,
    pub evaluated: usize,
    pub emitted: usize,
    pub sent: usize,
    pub failed: usize,
    pub suspended: usize,
    pub errors: usize,
}

impl CheckReport {
    fn new(checked_at: DateTime<Utc>) -> Self {
        Self {
            checked_at,
            skipped: None,
            evaluated: 0,
            emitted: 0,
            sent: 0,
            failed: 0,
            suspended: 0,
            errors: 0,
        }
    }
}

/// Wires the tenant store, settings, evaluator and dispatcher together.
pub struct SubscriptionEngine {
    db: DatabaseService,
    tenants: TenantService,
    settings: SettingsStore,
    feed: NotificationFeed,
    dispatcher: Dispatcher,
    pass_lock: Mutex<()>,
}

impl SubscriptionEngine {
    pub fn new(db: DatabaseService, senders: Senders, sender_timeout: Duration) -> Self {
        Self {
            tenants: TenantService::new(db.clone()),
            settings: SettingsStore::new(db.clone()),
            feed: NotificationFeed::new(db.clone()),
            dispatcher: Dispatcher::new(db.clone(), senders, sender_timeout),
            db,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn tenants(&self) -> &TenantService {
        &self.tenants
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub async fn health_check(&self) -> EngineResult<()> {
        self.db.health_check().await?;
        Ok(())
    }

    /// One evaluation pass. Runs at most once per calendar day unless
    /// `force` is set; passes never overlap.
    ///
    /// Suspensions happen before any notification is dispatched. Failures
    /// for a single tenant or notification are logged and counted without
    /// stopping the pass.
    pub async fn check_expiring_subscriptions(&self, now: DateTime<Utc>, force: bool) -> EngineResult<CheckReport> {
        let _pass = self.pass_lock.lock().await;

        let settings = self.settings.load().await?;
        let tenants = self.db.list_tenants().await?;
        let history = self.db.list_notifications().await?;

        let evaluation = evaluator::evaluate(&tenants, &settings, &history, now, force);
        let mut report = CheckReport::new(now);

        if let Some(reason) = evaluation.skipped {
            log::info!("Expiry check skipped: {:?}", reason);
            report.skipped = Some(reason);
            return Ok(report);
        }

        report.evaluated = evaluation.evaluated;
        log::info!(
            "Expiry check: {} active tenants, {} notifications due, {} to suspend",
            evaluation.evaluated,
            evaluation.intents.len(),
            evaluation.suspensions.len()
        );

        self.apply_evaluation(evaluation, &settings.channels, now, &mut report).await;

        self.settings.record_check(now).await?;

        log::info!(
            "Expiry check done: {} sent, {} failed, {} suspended, {} errors",
            report.sent,
            report.failed,
            report.suspended,
            report.errors
        );
        Ok(report)
    }

    /// Suspensions first. An `expired` notice is withheld when its tenant
    /// could not be suspended, so both are retried by the next pass.
    async fn apply_evaluation(
        &self,
        evaluation: Evaluation,
        channels: &[Channel],
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) {
        let mut withheld = HashSet::new();
        for tenant_id in &evaluation.suspensions {
            match self.tenants.suspend_if_expired(*tenant_id, AUTO_SUSPEND_REASON, now).await {
                Ok(Some(_)) => report.suspended += 1,
                Ok(None) => {
                    log::info!("Tenant {} changed since evaluation, not suspended", tenant_id);
                    withheld.insert(*tenant_id);
                }
                Err(e) => {
                    log::error!("Auto-suspend of tenant {} failed: {}", tenant_id, e);
                    report.errors += 1;
                    withheld.insert(*tenant_id);
                }
            }
        }

        for intent in evaluation.intents {
            let tenant_id = intent.tenant_id;
            if intent.notification_type == NotificationType::Expired && withheld.contains(&tenant_id) {
                continue;
            }

            report.emitted += 1;
            match self.dispatcher.dispatch(intent, channels, now).await {
                Ok(notification) if notification.status == NotificationStatus::Sent => report.sent += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    log::error!("Dispatch for tenant {} failed: {}", tenant_id, e);
                    report.errors += 1;
                }
            }
        }
    }

    // Writes below take the pass lock so they never interleave with a pass.

    pub async fn update_notification_settings(&self, request: UpdateSettingsRequest) -> EngineResult<NotificationSettings> {
        let _guard = self.pass_lock.lock().await;
        self.settings.update(request).await
    }

    pub async fn update_tenant(
        &self,
        tenant_id: Uuid,
        request: UpdateTenantRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<Tenant> {
        let _guard = self.pass_lock.lock().await;
        self.tenants.update_tenant(tenant_id, request, now).await
    }

    pub async fn delete_tenant(&self, tenant_id: Uuid) -> EngineResult<()> {
        let _guard = self.pass_lock.lock().await;
        self.tenants.delete_tenant(tenant_id).await
    }

    pub async fn activate_tenant(&self, tenant_id: Uuid, now: DateTime<Utc>) -> EngineResult<Tenant> {
        let _guard = self.pass_lock.lock().await;
        self.tenants.activate_tenant(tenant_id, now).await
    }

    /// Admin suspension; the owner is told through the configured channels.
    pub async fn suspend_tenant(&self, tenant_id: Uuid, reason: &str, now: DateTime<Utc>) -> EngineResult<Tenant> {
        let _guard = self.pass_lock.lock().await;
        let tenant = self.tenants.suspend_tenant(tenant_id, reason, now).await?;
        self.announce(&tenant, NotificationType::Suspended, now).await;
        Ok(tenant)
    }

    pub async fn renew_subscription(&self, tenant_id: Uuid, days: Option<i64>, now: DateTime<Utc>) -> EngineResult<Tenant> {
        let _guard = self.pass_lock.lock().await;
        let tenant = self.tenants.renew_subscription(tenant_id, days, now).await?;
        self.announce(&tenant, NotificationType::Renewed, now).await;
        Ok(tenant)
    }

    /// Best effort: the admin action has already been stored, so a failure
    /// here is only logged.
    async fn announce(&self, tenant: &Tenant, notification_type: NotificationType, now: DateTime<Utc>) {
        let result: EngineResult<()> = async {
            let settings = self.settings.load().await?;
            if !settings.enabled {
                return Ok(());
            }

            let days = tenant.days_until_expiry(now);
            let key = DedupKey::new(tenant.id, notification_type, days);
            let history = self.feed.list_notifications(Some(tenant.id)).await?;
            if evaluator::sent_keys(&history).contains(&key) {
                return Ok(());
            }

            let intent = NotificationIntent::for_tenant(tenant, notification_type, days);
            self.dispatcher.dispatch(intent, &settings.channels, now).await.map(|_| ())
        }
        .await;

        if let Err(e) = result {
            log::error!("Could not notify tenant {} of {:?}: {}", tenant.id, notification_type, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        notification::SubscriptionNotification,
        plan::SubscriptionPlan,
        tenant::{CreateTenantRequest, TenantStatus},
    };
    use crate::services::dispatcher::tests::Scripted;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Arc;

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 7, 15, 0).unwrap()
    }

    async fn engine_with(senders: Senders) -> SubscriptionEngine {
        let db = DatabaseService::new("memory://").await.unwrap();
        SubscriptionEngine::new(db, senders, Duration::from_millis(200))
    }

    async fn engine() -> SubscriptionEngine {
        engine_with(Senders::new().with(Channel::InApp, Scripted::accept())).await
    }

    async fn active_tenant(engine: &SubscriptionEngine, name: &str, expires_in_days: i64) -> Tenant {
        let tenant = engine
            .tenants()
            .create_tenant(
                CreateTenantRequest {
                    store_name: name.to_string(),
                    plan: SubscriptionPlan::Pro,
                    owner_id: format!("owner-{}", name),
                    owner_name: "Sipho Dlamini".to_string(),
                    owner_phone: "+27831234567".to_string(),
                    owner_email: None,
                },
                today() - ChronoDuration::days(30),
            )
            .await
            .unwrap();
        let mut tenant = engine.tenants().activate_tenant(tenant.id, today()).await.unwrap();
        tenant.expiry_date = today() + ChronoDuration::days(expires_in_days);
        engine.db.save_tenant(&tenant).await.unwrap();
        tenant
    }

    async fn notifications_for(engine: &SubscriptionEngine, tenant_id: Uuid) -> Vec<SubscriptionNotification> {
        engine.feed().list_notifications(Some(tenant_id)).await.unwrap()
    }

    async fn enable_auto_suspend(engine: &SubscriptionEngine) {
        engine
            .update_notification_settings(UpdateSettingsRequest {
                auto_suspend_on_expiry: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_warning_then_expiry_scenario() {
        let engine = engine().await;
        enable_auto_suspend(&engine).await;
        let tenant = active_tenant(&engine, "Soweto Spaza", 7).await;

        let first = engine.check_expiring_subscriptions(today(), false).await.unwrap();
        assert_eq!(first.emitted, 1);
        assert_eq!(first.sent, 1);
        let notifications = notifications_for(&engine, tenant.id).await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification_type, NotificationType::ExpiryWarning);
        assert_eq!(notifications[0].days_until_expiry, 7);

        let again = engine.check_expiring_subscriptions(today() + ChronoDuration::hours(8), false).await.unwrap();
        assert_eq!(again.skipped, Some(SkipReason::AlreadyCheckedToday));
        assert_eq!(notifications_for(&engine, tenant.id).await.len(), 1);

        let after_expiry = engine
            .check_expiring_subscriptions(today() + ChronoDuration::days(8), false)
            .await
            .unwrap();
        assert_eq!(after_expiry.emitted, 1);
        assert_eq!(after_expiry.suspended, 1);

        let notifications = notifications_for(&engine, tenant.id).await;
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].notification_type, NotificationType::Expired);
        assert_eq!(notifications[0].days_until_expiry, -1);

        let stored = engine.tenants().get_tenant(tenant.id).await.unwrap();
        assert_eq!(stored.status, TenantStatus::Suspended);
        assert_eq!(stored.suspension_reason.as_deref(), Some(AUTO_SUSPEND_REASON));
    }

    #[tokio::test]
    async fn test_forced_rechecks_never_duplicate_sent_notifications() {
        let engine = engine().await;
        let tenant = active_tenant(&engine, "Durban Deli", 15).await;

        for hour in 0..3 {
            engine
                .check_expiring_subscriptions(today() + ChronoDuration::hours(hour), true)
                .await
                .unwrap();
        }

        let sent: Vec<_> = notifications_for(&engine, tenant.id)
            .await
            .into_iter()
            .filter(|n| n.status == NotificationStatus::Sent)
            .collect();
        assert_eq!(sent.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_sent_once_without_auto_suspend() {
        let engine = engine().await;
        let tenant = active_tenant(&engine, "Cape Corner", -3).await;

        for day in 0..4 {
            engine
                .check_expiring_subscriptions(today() + ChronoDuration::days(day), false)
                .await
                .unwrap();
        }

        let notifications = notifications_for(&engine, tenant.id).await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification_type, NotificationType::Expired);
        let stored = engine.tenants().get_tenant(tenant.id).await.unwrap();
        assert_eq!(stored.status, TenantStatus::Active);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_recorded_and_pass_continues() {
        let engine = engine_with(
            Senders::new()
                .with(Channel::Sms, Scripted::reject())
                .with(Channel::InApp, Scripted::accept()),
        )
        .await;
        engine
            .update_notification_settings(UpdateSettingsRequest {
                channels: Some(vec![Channel::Sms, Channel::InApp]),
                ..Default::default()
            })
            .await
            .unwrap();
        let first = active_tenant(&engine, "Pretoria Produce", 3).await;
        let second = active_tenant(&engine, "Polokwane Provisions", 1).await;

        let report = engine.check_expiring_subscriptions(today(), false).await.unwrap();
        assert_eq!(report.emitted, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors, 0);

        for tenant_id in [first.id, second.id] {
            let notifications = notifications_for(&engine, tenant_id).await;
            assert_eq!(notifications.len(), 1);
            assert_eq!(notifications[0].status, NotificationStatus::Failed);
        }
        let settings = engine.settings().load().await.unwrap();
        assert_eq!(settings.last_check_date, Some(today()));
    }

    #[tokio::test]
    async fn test_disabled_check_is_a_noop() {
        let engine = engine().await;
        engine
            .update_notification_settings(UpdateSettingsRequest {
                enabled: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        let tenant = active_tenant(&engine, "East London Eats", 7).await;

        let report = engine.check_expiring_subscriptions(today(), true).await.unwrap();
        assert_eq!(report.skipped, Some(SkipReason::Disabled));
        assert!(notifications_for(&engine, tenant.id).await.is_empty());
        assert!(engine.settings().load().await.unwrap().last_check_date.is_none());
    }

    #[tokio::test]
    async fn test_quiet_day_still_records_check() {
        let engine = engine().await;
        active_tenant(&engine, "Kimberley Kitchen", 20).await;

        let report = engine.check_expiring_subscriptions(today(), false).await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.emitted, 0);

        let repeat = engine.check_expiring_subscriptions(today(), false).await.unwrap();
        assert_eq!(repeat.skipped, Some(SkipReason::AlreadyCheckedToday));
    }

    #[tokio::test]
    async fn test_admin_actions_notify_owner() {
        let in_app = Scripted::accept();
        let engine = engine_with(Senders::new().with(Channel::InApp, in_app.clone())).await;
        let tenant = active_tenant(&engine, "Bloem Bakery", -10).await;

        let renewed = engine.renew_subscription(tenant.id, Some(30), today()).await.unwrap();
        assert_eq!(renewed.status, TenantStatus::Active);
        assert_eq!(renewed.days_until_expiry(today()), 20);

        engine.suspend_tenant(tenant.id, "fraud review", today()).await.unwrap();

        let types: Vec<_> = notifications_for(&engine, tenant.id)
            .await
            .into_iter()
            .map(|n| n.notification_type)
            .collect();
        assert!(types.contains(&NotificationType::Renewed));
        assert!(types.contains(&NotificationType::Suspended));
        assert_eq!(in_app.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_checks_do_not_double_send() {
        let engine = Arc::new(engine().await);
        let tenant = active_tenant(&engine, "Nelspruit Naturals", 30).await;

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.check_expiring_subscriptions(today(), false).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.check_expiring_subscriptions(today(), false).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(notifications_for(&engine, tenant.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_auto_suspend_withholds_expired_notice_until_retry() {
        let engine = engine().await;
        enable_auto_suspend(&engine).await;

        let mut tenant = Tenant::new(
            CreateTenantRequest {
                store_name: "Gaborone Grocer".to_string(),
                plan: SubscriptionPlan::Basic,
                owner_id: "owner-g".to_string(),
                owner_name: "Neo Kgosi".to_string(),
                owner_phone: "+26771234567".to_string(),
                owner_email: None,
            },
            today() - ChronoDuration::days(60),
        );
        tenant.activate(today());
        tenant.expiry_date = today() - ChronoDuration::days(1);

        // Not stored yet, so the suspension write fails.
        let evaluation = Evaluation {
            evaluated: 1,
            suspensions: vec![tenant.id],
            intents: vec![NotificationIntent::for_tenant(&tenant, NotificationType::Expired, -1)],
            ..Default::default()
        };
        let mut report = CheckReport::new(today());
        engine
            .apply_evaluation(evaluation, &[Channel::InApp], today(), &mut report)
            .await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.emitted, 0);
        assert!(notifications_for(&engine, tenant.id).await.is_empty());

        engine.db.insert_tenant(&tenant).await.unwrap();
        let retry = engine.check_expiring_subscriptions(today(), true).await.unwrap();
        assert_eq!(retry.suspended, 1);
        assert_eq!(retry.sent, 1);
        assert_eq!(
            engine.tenants().get_tenant(tenant.id).await.unwrap().status,
            TenantStatus::Suspended
        );
    }

    #[tokio::test]
    async fn test_renewal_after_evaluation_is_not_suspended() {
        let engine = engine().await;
        enable_auto_suspend(&engine).await;
        let tenant = active_tenant(&engine, "Maseru Market", -2).await;

        let settings = engine.settings().load().await.unwrap();
        let evaluation = evaluator::evaluate(&[tenant.clone()], &settings, &[], today(), true);
        assert_eq!(evaluation.suspensions, vec![tenant.id]);

        engine.renew_subscription(tenant.id, Some(30), today()).await.unwrap();

        let mut report = CheckReport::new(today());
        engine
            .apply_evaluation(evaluation, &settings.channels, today(), &mut report)
            .await;
        assert_eq!(report.suspended, 0);
        assert_eq!(report.errors, 0);

        let stored = engine.tenants().get_tenant(tenant.id).await.unwrap();
        assert_eq!(stored.status, TenantStatus::Active);
        assert!(!notifications_for(&engine, tenant.id)
            .await
            .iter()
            .any(|n| n.notification_type == NotificationType::Expired));
    }

    #[tokio::test]
    async fn test_settings_update_during_pass_is_kept() {
        let engine = Arc::new(engine_with(Senders::new().with(Channel::InApp, Arc::new(Scripted::Hang))).await);
        active_tenant(&engine, "Windhoek Wholesale", 7).await;

        let pass = tokio::spawn({
            let engine = engine.clone();
            async move { engine.check_expiring_subscriptions(today(), false).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine
            .update_notification_settings(UpdateSettingsRequest {
                warning_days: Some(vec![10]),
                ..Default::default()
            })
            .await
            .unwrap();
        pass.await.unwrap().unwrap();

        let settings = engine.settings().load().await.unwrap();
        assert_eq!(settings.warning_days, vec![10]);
        assert_eq!(settings.last_check_date, Some(today()));
    }
}
