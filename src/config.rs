use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::models::{
    notification::Channel,
    settings::{NotificationSettings, DEFAULT_WARNING_DAYS},
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub scheduler: SchedulerConfig,
    pub senders: SenderConfig,
    pub defaults: SettingsDefaults,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub run_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub sms_gateway_url: Option<String>,
    pub email_gateway_url: Option<String>,
    pub signing_secret: String,
    pub timeout: Duration,
}

/// Seed values for the settings record; only used when none is stored yet.
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub warning_days: Vec<i64>,
    pub channels: Vec<Channel>,
    pub auto_suspend_on_expiry: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let check_interval = interval_from_hours(parse_var("CHECK_INTERVAL_HOURS", 24)?)?;

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "memory://".to_string()),

            port: parse_var("PORT", 8080)?,

            scheduler: SchedulerConfig {
                interval: check_interval,
                run_on_startup: parse_var("CHECK_ON_STARTUP", true)?,
            },

            senders: SenderConfig {
                sms_gateway_url: optional_var("SMS_GATEWAY_URL"),
                email_gateway_url: optional_var("EMAIL_GATEWAY_URL"),
                signing_secret: env::var("GATEWAY_SIGNING_SECRET").unwrap_or_default(),
                timeout: Duration::from_secs(parse_var("SENDER_TIMEOUT_SECS", 10)?),
            },

            defaults: SettingsDefaults::from_env()?,
        })
    }
}

impl SettingsDefaults {
    fn from_env() -> Result<Self> {
        let fallback = SettingsDefaults::default();
        Ok(SettingsDefaults {
            warning_days: match optional_var("DEFAULT_WARNING_DAYS") {
                Some(raw) => parse_list(&raw)?,
                None => fallback.warning_days,
            },
            channels: match optional_var("DEFAULT_CHANNELS") {
                Some(raw) => parse_channels(&raw)?,
                None => fallback.channels,
            },
            auto_suspend_on_expiry: parse_var("AUTO_SUSPEND_ON_EXPIRY", fallback.auto_suspend_on_expiry)?,
        })
    }

    pub fn to_settings(&self) -> NotificationSettings {
        NotificationSettings {
            enabled: true,
            warning_days: self.warning_days.clone(),
            channels: self.channels.clone(),
            auto_suspend_on_expiry: self.auto_suspend_on_expiry,
            last_check_date: None,
        }
        .normalized()
    }
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            warning_days: DEFAULT_WARNING_DAYS.to_vec(),
            channels: vec![Channel::InApp],
            auto_suspend_on_expiry: false,
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

fn interval_from_hours(hours: u64) -> Result<Duration> {
    if hours == 0 {
        return Err(anyhow!("CHECK_INTERVAL_HOURS must be at least 1"));
    }
    hours
        .checked_mul(60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow!("CHECK_INTERVAL_HOURS is too large: {}", hours))
}

fn parse_channels(raw: &str) -> Result<Vec<Channel>> {
    let channels = parse_list(raw)?;
    if channels.is_empty() {
        return Err(anyhow!("DEFAULT_CHANNELS must name at least one channel"));
    }
    Ok(channels)
}

fn parse_list<T>(raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(|e| anyhow!("Invalid list item {:?}: {}", item, e)))
        .collect()
}
