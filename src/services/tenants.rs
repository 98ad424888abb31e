use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    plan::get_plan,
    tenant::{CreateTenantRequest, Tenant, TenantFilter, TenantStats, TenantStatus, UpdateTenantRequest},
};
use crate::services::database::DatabaseService;

/// Tenant lifecycle mutations. Every mutation works on a copy of the stored
/// record and returns it only after the write succeeded.
#[derive(Clone)]
pub struct TenantService {
    db: DatabaseService,
}

impl TenantService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    pub async fn list_tenants(&self, filter: &TenantFilter) -> EngineResult<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self
            .db
            .list_tenants()
            .await?
            .into_iter()
            .filter(|tenant| filter.matches(tenant))
            .collect();
        tenants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tenants)
    }

    pub async fn get_tenant(&self, tenant_id: Uuid) -> EngineResult<Tenant> {
        self.db
            .get_tenant(&tenant_id)
            .await?
            .ok_or(EngineError::TenantNotFound(tenant_id))
    }

    pub async fn create_tenant(&self, request: CreateTenantRequest, now: DateTime<Utc>) -> EngineResult<Tenant> {
        request.validate()?;

        let tenant = Tenant::new(request, now);
        self.db.insert_tenant(&tenant).await?;

        log::info!("Created tenant {} ({}) on {} plan", tenant.store_name, tenant.id, tenant.plan);
        Ok(tenant)
    }

    pub async fn update_tenant(
        &self,
        tenant_id: Uuid,
        request: UpdateTenantRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<Tenant> {
        request.validate()?;
        self.mutate(tenant_id, |tenant| tenant.apply_update(request, now)).await
    }

    pub async fn delete_tenant(&self, tenant_id: Uuid) -> EngineResult<()> {
        if !self.db.delete_tenant(&tenant_id).await? {
            return Err(EngineError::TenantNotFound(tenant_id));
        }
        log::info!("Deleted tenant {}", tenant_id);
        Ok(())
    }

    pub async fn suspend_tenant(&self, tenant_id: Uuid, reason: &str, now: DateTime<Utc>) -> EngineResult<Tenant> {
        let tenant = self
            .mutate(tenant_id, |tenant| {
                tenant.suspend(reason, now);
                Ok(())
            })
            .await?;
        log::info!("Suspended tenant {}: {}", tenant_id, reason);
        Ok(tenant)
    }

    /// Suspends only if the stored record is still active and past expiry.
    /// `None` means the tenant changed since it was evaluated and was left
    /// as is.
    pub async fn suspend_if_expired(
        &self,
        tenant_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<Tenant>> {
        let mut tenant = self.get_tenant(tenant_id).await?;
        if tenant.status != TenantStatus::Active || tenant.days_until_expiry(now) >= 0 {
            return Ok(None);
        }

        tenant.suspend(reason, now);
        self.db.save_tenant(&tenant).await?;
        log::info!("Suspended tenant {}: {}", tenant_id, reason);
        Ok(Some(tenant))
    }

    pub async fn activate_tenant(&self, tenant_id: Uuid, now: DateTime<Utc>) -> EngineResult<Tenant> {
        let tenant = self
            .mutate(tenant_id, |tenant| {
                tenant.activate(now);
                Ok(())
            })
            .await?;
        log::info!("Activated tenant {}", tenant_id);
        Ok(tenant)
    }

    /// Extends the stored expiry by `days`, or by the plan's duration when
    /// not given.
    pub async fn renew_subscription(
        &self,
        tenant_id: Uuid,
        days: Option<i64>,
        now: DateTime<Utc>,
    ) -> EngineResult<Tenant> {
        if let Some(days) = days {
            if days < 1 {
                return Err(EngineError::Validation("Renewal must be at least one day".to_string()));
            }
        }

        let tenant = self
            .mutate(tenant_id, |tenant| {
                let days = days.unwrap_or_else(|| get_plan(tenant.plan).duration_days);
                tenant.renew(days, now);
                Ok(())
            })
            .await?;

        if tenant.expiry_date < now {
            log::warn!(
                "Tenant {} renewed but expiry {} is still in the past",
                tenant_id,
                tenant.expiry_date
            );
        } else {
            log::info!("Renewed tenant {} until {}", tenant_id, tenant.expiry_date);
        }
        Ok(tenant)
    }

    pub async fn stats(&self) -> EngineResult<TenantStats> {
        let tenants = self.db.list_tenants().await?;
        Ok(TenantStats::from_tenants(&tenants))
    }

    async fn mutate<F>(&self, tenant_id: Uuid, change: F) -> EngineResult<Tenant>
    where
        F: FnOnce(&mut Tenant) -> EngineResult<()>,
    {
        let mut tenant = self.get_tenant(tenant_id).await?;
        change(&mut tenant)?;
        self.db.save_tenant(&tenant).await?;
        Ok(tenant)
    }
}
