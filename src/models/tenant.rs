use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{EngineError, EngineResult};
use crate::models::plan::{get_plan, Feature, SubscriptionPlan};
use crate::utils::dates;

/// Lifecycle status. Only `Active` tenants are evaluated for expiry.
///
/// `Expired` is never set by the expiry check: a lapsed tenant stays
/// `Active` unless auto-suspend moves it to `Suspended`. The status exists
/// for records written by other tools and is counted in stats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Trial,
    Active,
    Expired,
    Suspended,
}

/// Store owner; the addressee of every notification about the tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantOwner {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub max_staff: Option<u32>,
    pub max_customers: Option<u32>,
}

impl PlanLimits {
    pub fn allows_staff(&self, count: u32) -> bool {
        self.max_staff.map_or(true, |max| count <= max)
    }

    pub fn allows_customers(&self, count: u32) -> bool {
        self.max_customers.map_or(true, |max| count <= max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub store_name: String,
    pub owner: TenantOwner,
    pub plan: SubscriptionPlan,
    pub status: TenantStatus,
    pub start_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub last_renewed_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    #[serde(default)]
    pub staff_count: u32,
    #[serde(default)]
    pub customer_count: u32,
    #[serde(default)]
    pub debt_count: u32,
    #[serde(default)]
    pub total_debt_amount: Decimal,
    #[serde(default)]
    pub total_paid_amount: Decimal,
    pub limits: PlanLimits,
    pub features: BTreeSet<Feature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    #[validate(length(min = 2, max = 100, message = "Store name must be between 2 and 100 characters"))]
    pub store_name: String,

    pub plan: SubscriptionPlan,

    #[validate(length(min = 1, message = "Owner id is required"))]
    pub owner_id: String,

    #[validate(length(min = 2, max = 100, message = "Owner name must be between 2 and 100 characters"))]
    pub owner_name: String,

    #[validate(custom = "validate_phone")]
    pub owner_phone: String,

    #[validate(email(message = "Invalid email format"))]
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantRequest {
    #[validate(length(min = 2, max = 100, message = "Store name must be between 2 and 100 characters"))]
    pub store_name: Option<String>,

    #[validate(length(min = 2, max = 100, message = "Owner name must be between 2 and 100 characters"))]
    pub owner_name: Option<String>,

    #[validate(custom = "validate_phone")]
    pub owner_phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub owner_email: Option<String>,

    pub staff_count: Option<u32>,
    pub customer_count: Option<u32>,
    pub debt_count: Option<u32>,
    pub total_debt_amount: Option<Decimal>,
    pub total_paid_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SuspendTenantRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be between 1 and 500 characters"))]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RenewSubscriptionRequest {
    #[validate(range(min = 1, max = 3650, message = "Days must be between 1 and 3650"))]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantFilter {
    pub status: Option<TenantStatus>,
    pub plan: Option<SubscriptionPlan>,
    pub search: Option<String>,
}

impl TenantFilter {
    pub fn matches(&self, tenant: &Tenant) -> bool {
        if self.status.map_or(false, |status| status != tenant.status) {
            return false;
        }
        if self.plan.map_or(false, |plan| plan != tenant.plan) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                tenant.store_name.to_lowercase().contains(&term)
                    || tenant.owner.name.to_lowercase().contains(&term)
                    || tenant.owner.phone.contains(&term)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantStats {
    pub total: usize,
    pub trial: usize,
    pub active: usize,
    pub expired: usize,
    pub suspended: usize,
    pub outstanding_amount: Decimal,
}

impl TenantStats {
    pub fn from_tenants(tenants: &[Tenant]) -> Self {
        tenants.iter().fold(Self::default(), |mut stats, tenant| {
            stats.total += 1;
            stats.outstanding_amount += tenant.outstanding_amount();
            match tenant.status {
                TenantStatus::Trial => stats.trial += 1,
                TenantStatus::Active => stats.active += 1,
                TenantStatus::Expired => stats.expired += 1,
                TenantStatus::Suspended => stats.suspended += 1,
            }
            stats
        })
    }
}

impl Tenant {
    /// New tenant in trial. Limits and features are copied from the plan
    /// catalog now and never recomputed afterwards.
    pub fn new(request: CreateTenantRequest, now: DateTime<Utc>) -> Self {
        let plan = get_plan(request.plan);
        Self {
            id: Uuid::new_v4(),
            store_name: request.store_name.trim().to_string(),
            owner: TenantOwner {
                id: request.owner_id,
                name: request.owner_name.trim().to_string(),
                phone: request.owner_phone,
                email: request.owner_email.map(|email| email.to_lowercase()),
            },
            plan: request.plan,
            status: TenantStatus::Trial,
            start_date: now,
            expiry_date: now + Duration::days(plan.trial_days),
            last_renewed_at: None,
            suspended_at: None,
            suspension_reason: None,
            staff_count: 0,
            customer_count: 0,
            debt_count: 0,
            total_debt_amount: Decimal::ZERO,
            total_paid_amount: Decimal::ZERO,
            limits: PlanLimits {
                max_staff: plan.max_staff,
                max_customers: plan.max_customers,
            },
            features: plan.features,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = TenantStatus::Active;
        self.suspended_at = None;
        self.suspension_reason = None;
        self.updated_at = now;
    }

    pub fn suspend(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = TenantStatus::Suspended;
        self.suspended_at = Some(now);
        self.suspension_reason = Some(reason.into());
        self.updated_at = now;
    }

    /// Pushes the stored expiry forward by `duration_days`. The result can
    /// still be in the past when the overage exceeds the renewal.
    pub fn renew(&mut self, duration_days: i64, now: DateTime<Utc>) {
        self.expiry_date = self.expiry_date + Duration::days(duration_days);
        self.status = TenantStatus::Active;
        self.last_renewed_at = Some(now);
        self.suspended_at = None;
        self.suspension_reason = None;
        self.updated_at = now;
    }

    pub fn apply_update(&mut self, request: UpdateTenantRequest, now: DateTime<Utc>) -> EngineResult<()> {
        if let Some(staff) = request.staff_count {
            if !self.limits.allows_staff(staff) {
                return Err(EngineError::LimitExceeded(format!(
                    "{} plan allows at most {} staff",
                    self.plan,
                    self.limits.max_staff.unwrap_or_default()
                )));
            }
        }
        if let Some(customers) = request.customer_count {
            if !self.limits.allows_customers(customers) {
                return Err(EngineError::LimitExceeded(format!(
                    "{} plan allows at most {} customers",
                    self.plan,
                    self.limits.max_customers.unwrap_or_default()
                )));
            }
        }
        for amount in [request.total_debt_amount, request.total_paid_amount].into_iter().flatten() {
            if amount.is_sign_negative() {
                return Err(EngineError::Validation("Amounts cannot be negative".to_string()));
            }
        }

        if let Some(store_name) = request.store_name {
            self.store_name = store_name.trim().to_string();
        }
        if let Some(name) = request.owner_name {
            self.owner.name = name.trim().to_string();
        }
        if let Some(phone) = request.owner_phone {
            self.owner.phone = phone;
        }
        if let Some(email) = request.owner_email {
            self.owner.email = Some(email.to_lowercase());
        }
        if let Some(staff) = request.staff_count {
            self.staff_count = staff;
        }
        if let Some(customers) = request.customer_count {
            self.customer_count = customers;
        }
        if let Some(debts) = request.debt_count {
            self.debt_count = debts;
        }
        if let Some(amount) = request.total_debt_amount {
            self.total_debt_amount = amount;
        }
        if let Some(amount) = request.total_paid_amount {
            self.total_paid_amount = amount;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Signed day count from `now` to the expiry date; negative once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        dates::days_between(now, self.expiry_date)
    }

    pub fn outstanding_amount(&self) -> Decimal {
        self.total_debt_amount - self.total_paid_amount
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern is valid"))
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let normalized: String = phone.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !phone_pattern().is_match(&normalized) {
        let mut error = ValidationError::new("invalid_phone");
        error.message = Some("Phone number must contain 7 to 15 digits".into());
        return Err(error);
    }
    Ok(())
}
