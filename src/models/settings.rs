use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::notification::Channel;
use crate::utils::dates;

pub const DEFAULT_WARNING_DAYS: [i64; 5] = [30, 15, 7, 3, 1];
const MAX_WARNING_DAY: i64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub warning_days: Vec<i64>,
    pub channels: Vec<Channel>,
    pub auto_suspend_on_expiry: bool,
    pub last_check_date: Option<DateTime<Utc>>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_days: DEFAULT_WARNING_DAYS.to_vec(),
            channels: vec![Channel::InApp],
            auto_suspend_on_expiry: false,
            last_check_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub enabled: Option<bool>,

    #[validate(custom = "validate_warning_days")]
    pub warning_days: Option<Vec<i64>>,

    #[validate(length(min = 1, message = "At least one channel is required"))]
    pub channels: Option<Vec<Channel>>,

    pub auto_suspend_on_expiry: Option<bool>,
}

impl NotificationSettings {
    /// Warning days sorted descending without duplicates, channels without
    /// duplicates in their configured order.
    pub fn normalized(mut self) -> Self {
        self.warning_days.sort_unstable_by(|a, b| b.cmp(a));
        self.warning_days.dedup();

        let mut channels = Vec::with_capacity(self.channels.len());
        for channel in self.channels {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
        self.channels = channels;
        self
    }

    pub fn apply(self, request: UpdateSettingsRequest) -> Self {
        let mut settings = self;
        if let Some(enabled) = request.enabled {
            settings.enabled = enabled;
        }
        if let Some(warning_days) = request.warning_days {
            settings.warning_days = warning_days;
        }
        if let Some(channels) = request.channels {
            settings.channels = channels;
        }
        if let Some(auto_suspend) = request.auto_suspend_on_expiry {
            settings.auto_suspend_on_expiry = auto_suspend;
        }
        settings.normalized()
    }

    pub fn checked_on_same_day(&self, now: DateTime<Utc>) -> bool {
        self.last_check_date
            .map_or(false, |last| dates::same_calendar_day(last, now))
    }

    pub fn is_warning_day(&self, days: i64) -> bool {
        self.warning_days.contains(&days)
    }
}

fn validate_warning_days(days: &[i64]) -> Result<(), ValidationError> {
    if days.iter().any(|day| !(0..=MAX_WARNING_DAY).contains(day)) {
        let mut error = ValidationError::new("warning_day_out_of_range");
        error.message = Some("Warning days must be between 0 and 365".into());
        return Err(error);
    }
    Ok(())
}
