use actix_web::web;

pub mod health;
pub mod notifications;
pub mod subscriptions;
pub mod tenants;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Tenant lifecycle; /stats must precede /{tenant_id}
            .service(
                web::scope("/tenants")
                    .service(tenants::list_tenants)
                    .service(tenants::create_tenant)
                    .service(tenants::tenant_stats)
                    .service(tenants::get_tenant)
                    .service(tenants::update_tenant)
                    .service(tenants::delete_tenant)
                    .service(tenants::suspend_tenant)
                    .service(tenants::activate_tenant)
                    .service(tenants::renew_subscription),
            )
            // Expiry checks
            .service(web::scope("/subscriptions").service(subscriptions::check_subscriptions))
            // Notification feed and settings
            .service(
                web::scope("/notifications")
                    .service(notifications::get_settings)
                    .service(notifications::update_settings)
                    .service(notifications::unread_notifications)
                    .service(notifications::mark_all_as_read)
                    .service(notifications::list_notifications)
                    .service(notifications::mark_as_read),
            )
            .service(subscriptions::get_plans)
            .service(health::health_check),
    );
}
