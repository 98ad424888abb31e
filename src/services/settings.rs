use chrono::{DateTime, Utc};
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use crate::models::settings::{NotificationSettings, UpdateSettingsRequest};
use crate::services::database::DatabaseService;

#[derive(Clone)]
pub struct SettingsStore {
    db: DatabaseService,
}

impl SettingsStore {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Stored settings, or the built-in defaults when nothing is stored yet.
    pub async fn load(&self) -> EngineResult<NotificationSettings> {
        Ok(self.db.get_settings().await?.unwrap_or_default())
    }

    /// Writes `defaults` only if no settings record exists.
    pub async fn seed(&self, defaults: NotificationSettings) -> EngineResult<NotificationSettings> {
        if let Some(existing) = self.db.get_settings().await? {
            return Ok(existing);
        }
        if defaults.channels.is_empty() {
            return Err(EngineError::Validation("At least one channel is required".to_string()));
        }
        let settings = defaults.normalized();
        self.db.save_settings(&settings).await?;
        log::info!(
            "Seeded notification settings: warning days {:?}, channels {:?}",
            settings.warning_days,
            settings.channels
        );
        Ok(settings)
    }

    pub async fn update(&self, request: UpdateSettingsRequest) -> EngineResult<NotificationSettings> {
        request.validate()?;
        let settings = self.load().await?.apply(request);
        self.db.save_settings(&settings).await?;
        log::info!("Notification settings updated");
        Ok(settings)
    }

    pub async fn record_check(&self, now: DateTime<Utc>) -> EngineResult<()> {
        let mut settings = self.load().await?;
        settings.last_check_date = Some(now);
        self.db.save_settings(&settings).await?;
        Ok(())
    }
}
