use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, patch, post, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{common::ApiResponse, settings::UpdateSettingsRequest};
use crate::services::engine::SubscriptionEngine;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub tenant_id: Option<Uuid>,
}

#[get("/settings")]
pub async fn get_settings(engine: Data<SubscriptionEngine>) -> Result<HttpResponse, EngineError> {
    let settings = engine.settings().load().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(settings)))
}

#[patch("/settings")]
pub async fn update_settings(
    engine: Data<SubscriptionEngine>,
    payload: Json<UpdateSettingsRequest>,
) -> Result<HttpResponse, EngineError> {
    let settings = engine.update_notification_settings(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        settings,
        "Notification settings updated".to_string(),
    )))
}

#[get("")]
pub async fn list_notifications(
    engine: Data<SubscriptionEngine>,
    query: Query<NotificationQuery>,
) -> Result<HttpResponse, EngineError> {
    let notifications = engine.feed().list_notifications(query.tenant_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

#[get("/unread")]
pub async fn unread_notifications(engine: Data<SubscriptionEngine>) -> Result<HttpResponse, EngineError> {
    let notifications = engine.feed().unread_notifications().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
        "count": notifications.len(),
        "notifications": notifications
    }))))
}

#[post("/{notification_id}/read")]
pub async fn mark_as_read(engine: Data<SubscriptionEngine>, path: Path<Uuid>) -> Result<HttpResponse, EngineError> {
    let notification = engine.feed().mark_as_read(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notification)))
}

#[post("/read-all")]
pub async fn mark_all_as_read(engine: Data<SubscriptionEngine>) -> Result<HttpResponse, EngineError> {
    let updated = engine.feed().mark_all_as_read().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        serde_json::json!({ "updated": updated }),
        format!("{} notifications marked as read", updated),
    )))
}
