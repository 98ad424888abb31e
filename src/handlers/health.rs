use actix_web::web::Data;
use actix_web::{get, HttpResponse};
use chrono::Utc;

use crate::error::EngineError;
use crate::models::common::ApiResponse;
use crate::services::engine::SubscriptionEngine;

#[get("/health")]
pub async fn health_check(engine: Data<SubscriptionEngine>) -> Result<HttpResponse, EngineError> {
    engine.health_check().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": "tenant-subscriptions"
    }))))
}
