mod config;
mod error;
mod handlers;
mod models;
mod services;
mod tasks;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;

use services::{database::DatabaseService, engine::SubscriptionEngine, senders::Senders};
use tasks::expiry_task::ExpiryScheduler;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env().context("Failed to load configuration")?;

    let database_service = DatabaseService::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;

    let senders = Senders::from_config(&config.senders);
    let engine = Arc::new(SubscriptionEngine::new(database_service, senders, config.senders.timeout));

    engine
        .settings()
        .seed(config.defaults.to_settings())
        .await
        .context("Failed to seed notification settings")?;

    let scheduler = ExpiryScheduler::start(engine.clone(), config.scheduler.clone());

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting tenant subscription server on {}", bind_address);

    let app_engine = web::Data::from(engine);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .supports_credentials(),
            )
            .app_data(app_engine.clone())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await;

    scheduler.shutdown().await;
    server.context("HTTP server error")
}
