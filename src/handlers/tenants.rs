use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch, post, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::EngineError;
use crate::models::{
    common::ApiResponse,
    tenant::{CreateTenantRequest, RenewSubscriptionRequest, SuspendTenantRequest, TenantFilter, UpdateTenantRequest},
};
use crate::services::engine::SubscriptionEngine;

#[get("")]
pub async fn list_tenants(
    engine: Data<SubscriptionEngine>,
    filter: Query<TenantFilter>,
) -> Result<HttpResponse, EngineError> {
    let tenants = engine.tenants().list_tenants(&filter).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(tenants)))
}

#[post("")]
pub async fn create_tenant(
    engine: Data<SubscriptionEngine>,
    payload: Json<CreateTenantRequest>,
) -> Result<HttpResponse, EngineError> {
    let tenant = engine.tenants().create_tenant(payload.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        tenant,
        "Tenant created on trial".to_string(),
    )))
}

#[get("/stats")]
pub async fn tenant_stats(engine: Data<SubscriptionEngine>) -> Result<HttpResponse, EngineError> {
    let stats = engine.tenants().stats().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

#[get("/{tenant_id}")]
pub async fn get_tenant(engine: Data<SubscriptionEngine>, path: Path<Uuid>) -> Result<HttpResponse, EngineError> {
    let tenant = engine.tenants().get_tenant(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(tenant)))
}

#[patch("/{tenant_id}")]
pub async fn update_tenant(
    engine: Data<SubscriptionEngine>,
    path: Path<Uuid>,
    payload: Json<UpdateTenantRequest>,
) -> Result<HttpResponse, EngineError> {
    let tenant = engine
        .update_tenant(path.into_inner(), payload.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(tenant)))
}

#[delete("/{tenant_id}")]
pub async fn delete_tenant(engine: Data<SubscriptionEngine>, path: Path<Uuid>) -> Result<HttpResponse, EngineError> {
    engine.delete_tenant(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/{tenant_id}/suspend")]
pub async fn suspend_tenant(
    engine: Data<SubscriptionEngine>,
    path: Path<Uuid>,
    payload: Json<SuspendTenantRequest>,
) -> Result<HttpResponse, EngineError> {
    payload.validate()?;
    let tenant = engine
        .suspend_tenant(path.into_inner(), payload.reason.trim(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(tenant, "Tenant suspended".to_string())))
}

#[post("/{tenant_id}/activate")]
pub async fn activate_tenant(engine: Data<SubscriptionEngine>, path: Path<Uuid>) -> Result<HttpResponse, EngineError> {
    let tenant = engine.activate_tenant(path.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(tenant, "Tenant activated".to_string())))
}

#[post("/{tenant_id}/renew")]
pub async fn renew_subscription(
    engine: Data<SubscriptionEngine>,
    path: Path<Uuid>,
    payload: Json<RenewSubscriptionRequest>,
) -> Result<HttpResponse, EngineError> {
    payload.validate()?;
    let tenant = engine
        .renew_subscription(path.into_inner(), payload.days, Utc::now())
        .await?;
    let message = format!("Subscription renewed until {}", tenant.expiry_date.format("%Y-%m-%d"));
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(tenant, message)))
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure;
    use crate::services::{database::DatabaseService, engine::SubscriptionEngine, senders::Senders};
    use actix_web::http::StatusCode;
    use actix_web::{test, web::Data, App};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn engine() -> Data<SubscriptionEngine> {
        let db = DatabaseService::new("memory://").await.unwrap();
        Data::new(SubscriptionEngine::new(db, Senders::new(), Duration::from_secs(1)))
    }

    #[actix_web::test]
    async fn test_tenant_lifecycle_over_http() {
        let app = test::init_service(App::new().app_data(engine().await).configure(configure)).await;

        let created = test::TestRequest::post()
            .uri("/api/v1/tenants")
            .set_json(json!({
                "storeName": "Accra Provisions",
                "plan": "basic",
                "ownerId": "owner-1",
                "ownerName": "Ama Owusu",
                "ownerPhone": "+233 24 123 4567"
            }))
            .send_request(&app)
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(created).await;
        assert_eq!(body["data"]["status"], "trial");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let renewed = test::TestRequest::post()
            .uri(&format!("/api/v1/tenants/{}/renew", id))
            .set_json(json!({ "days": 30 }))
            .send_request(&app)
            .await;
        assert_eq!(renewed.status(), StatusCode::OK);
        let body: Value = test::read_body_json(renewed).await;
        assert_eq!(body["data"]["status"], "active");

        let stats = test::TestRequest::get().uri("/api/v1/tenants/stats").send_request(&app).await;
        let body: Value = test::read_body_json(stats).await;
        assert_eq!(body["data"]["active"], 1);

        let deleted = test::TestRequest::delete()
            .uri(&format!("/api/v1/tenants/{}", id))
            .send_request(&app)
            .await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = test::TestRequest::get()
            .uri(&format!("/api/v1/tenants/{}", id))
            .send_request(&app)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(missing).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_invalid_requests_are_rejected() {
        let app = test::init_service(App::new().app_data(engine().await).configure(configure)).await;

        let invalid_phone = test::TestRequest::post()
            .uri("/api/v1/tenants")
            .set_json(json!({
                "storeName": "Kumasi Kiosk",
                "plan": "pro",
                "ownerId": "owner-2",
                "ownerName": "Kofi",
                "ownerPhone": "call me"
            }))
            .send_request(&app)
            .await;
        assert_eq!(invalid_phone.status(), StatusCode::BAD_REQUEST);

        let empty_reason = test::TestRequest::post()
            .uri(&format!("/api/v1/tenants/{}/suspend", uuid::Uuid::new_v4()))
            .set_json(json!({ "reason": "" }))
            .send_request(&app)
            .await;
        assert_eq!(empty_reason.status(), StatusCode::BAD_REQUEST);
    }
}
