use actix_web::web::{Data, Query};
use actix_web::{get, post, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::error::EngineError;
use crate::models::{common::ApiResponse, plan};
use crate::services::engine::SubscriptionEngine;

#[derive(Debug, Default, Deserialize)]
pub struct CheckQuery {
    pub force: Option<bool>,
}

/// Manual expiry check. `?force=true` ignores the once-per-day guard.
#[post("/check")]
pub async fn check_subscriptions(
    engine: Data<SubscriptionEngine>,
    query: Query<CheckQuery>,
) -> Result<HttpResponse, EngineError> {
    let report = engine
        .check_expiring_subscriptions(Utc::now(), query.force.unwrap_or(false))
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

#[get("/plans")]
pub async fn get_plans() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(plan::list_plans()))
}
