use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::services::engine::SubscriptionEngine;

/// Background task running the daily expiry check.
pub struct ExpiryScheduler {
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ExpiryScheduler {
    pub fn start(engine: Arc<SubscriptionEngine>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(engine, config, shutdown_rx));
        Self { handle, shutdown_tx }
    }

    /// Stops the loop. A pass already in progress runs to completion.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            log::error!("Expiry scheduler ended abnormally: {}", e);
        }
    }
}

async fn run(engine: Arc<SubscriptionEngine>, config: SchedulerConfig, mut shutdown_rx: mpsc::Receiver<()>) {
    log::info!(
        "Expiry scheduler started: every {:?}, run on startup: {}",
        config.interval,
        config.run_on_startup
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !config.run_on_startup {
        // first tick completes immediately
        ticker.tick().await;
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match engine.check_expiring_subscriptions(Utc::now(), false).await {
                    Ok(report) => log::debug!("Scheduled expiry check: {:?}", report),
                    Err(e) => log::error!("Scheduled expiry check failed: {}", e),
                }
            }
        }
    }

    log::info!("Expiry scheduler stopped");
}
