use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Basic,
    Pro,
    Enterprise,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DebtTracking,
    PaymentRecording,
    CustomerReminders,
    StaffAccounts,
    Reports,
    DataExport,
    MultiBranch,
    PrioritySupport,
}

/// Limits and feature set a plan grants. `None` limits are unlimited.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAttributes {
    pub plan: SubscriptionPlan,
    pub name: &'static str,
    pub duration_days: i64,
    pub trial_days: i64,
    pub max_staff: Option<u32>,
    pub max_customers: Option<u32>,
    pub features: BTreeSet<Feature>,
}

impl SubscriptionPlan {
    pub const ALL: [SubscriptionPlan; 3] = [
        SubscriptionPlan::Basic,
        SubscriptionPlan::Pro,
        SubscriptionPlan::Enterprise,
    ];

    pub fn attributes(&self) -> PlanAttributes {
        match self {
            SubscriptionPlan::Basic => PlanAttributes {
                plan: *self,
                name: "Basic",
                duration_days: 30,
                trial_days: 14,
                max_staff: Some(2),
                max_customers: Some(200),
                features: BTreeSet::from([Feature::DebtTracking, Feature::PaymentRecording]),
            },
            SubscriptionPlan::Pro => PlanAttributes {
                plan: *self,
                name: "Pro",
                duration_days: 30,
                trial_days: 14,
                max_staff: Some(10),
                max_customers: Some(2_000),
                features: BTreeSet::from([
                    Feature::DebtTracking,
                    Feature::PaymentRecording,
                    Feature::CustomerReminders,
                    Feature::StaffAccounts,
                    Feature::Reports,
                ]),
            },
            SubscriptionPlan::Enterprise => PlanAttributes {
                plan: *self,
                name: "Enterprise",
                duration_days: 365,
                trial_days: 30,
                max_staff: None,
                max_customers: None,
                features: BTreeSet::from([
                    Feature::DebtTracking,
                    Feature::PaymentRecording,
                    Feature::CustomerReminders,
                    Feature::StaffAccounts,
                    Feature::Reports,
                    Feature::DataExport,
                    Feature::MultiBranch,
                    Feature::PrioritySupport,
                ]),
            },
        }
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionPlan::Basic => write!(f, "basic"),
            SubscriptionPlan::Pro => write!(f, "pro"),
            SubscriptionPlan::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Plan catalog lookup.
pub fn get_plan(plan: SubscriptionPlan) -> PlanAttributes {
    plan.attributes()
}

pub fn list_plans() -> Vec<PlanAttributes> {
    SubscriptionPlan::ALL.iter().map(|plan| plan.attributes()).collect()
}
