use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::clock::TimezoneResolver;
use crate::error::{Result, ShiftbotError};
use crate::shift::ShiftCalculator;
use crate::types::{ShiftLabel, TimeOfDay};

pub const DEFAULT_LISTEN_PORT: u16 = 10000;
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DELIVERY_PAUSE_MILLIS: u64 = 1000;

/// Top-level config (shiftbot.toml + SHIFTBOT_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftbotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub shifts: ShiftsConfig,
    #[serde(default)]
    pub timezone: TimezoneConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub listing: ListingConfig,
}

/// How the bot receives updates from Telegram.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Long polling; no public URL required.
    #[default]
    Polling,
    /// Telegram pushes updates to `webhook_url`; the bot listens on `listen_port`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub mode: UpdateMode,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            mode: UpdateMode::Polling,
            webhook_url: None,
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Rotation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftsConfig {
    /// Rotation order; index 0 is the night crew of the reference date.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    /// Day 0 of the rotation (`YYYY-MM-DD`).
    #[serde(default = "default_reference_date")]
    pub reference_date: NaiveDate,
    #[serde(default = "default_day_start")]
    pub day_start: TimeOfDay,
    #[serde(default = "default_night_start")]
    pub night_start: TimeOfDay,
}

impl Default for ShiftsConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            reference_date: default_reference_date(),
            day_start: default_day_start(),
            night_start: default_night_start(),
        }
    }
}

/// Offsets east of UTC, in minutes. Defaults are CET/CEST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    #[serde(default = "default_standard_offset")]
    pub standard_offset_minutes: i32,
    #[serde(default = "default_summer_offset")]
    pub summer_offset_minutes: i32,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            standard_offset_minutes: default_standard_offset(),
            summer_offset_minutes: default_summer_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Local times of day at which the compiled report is broadcast.
    #[serde(default = "default_fire_times")]
    pub fire_times: Vec<TimeOfDay>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minimum gap between two firings.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Upper bound for a single subscriber delivery.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
    /// Pause between consecutive subscriber deliveries.
    #[serde(default = "default_delivery_pause")]
    pub delivery_pause_millis: u64,
    /// Where rendered documents are written before upload.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fire_times: default_fire_times(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            delivery_timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
            delivery_pause_millis: DEFAULT_DELIVERY_PAUSE_MILLIS,
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.shiftbot/shiftbot.db", home)
}
fn default_labels() -> Vec<String> {
    ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect()
}
fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 18).unwrap_or_default()
}
fn default_day_start() -> TimeOfDay {
    TimeOfDay::new(8, 0).unwrap_or_default()
}
fn default_night_start() -> TimeOfDay {
    TimeOfDay::new(20, 0).unwrap_or_default()
}
fn default_standard_offset() -> i32 {
    60
}
fn default_summer_offset() -> i32 {
    120
}
fn default_fire_times() -> Vec<TimeOfDay> {
    vec![default_day_start(), default_night_start()]
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}
fn default_delivery_timeout() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_SECS
}
fn default_delivery_pause() -> u64 {
    DEFAULT_DELIVERY_PAUSE_MILLIS
}
fn default_output_dir() -> String {
    std::env::temp_dir()
        .join("shiftbot")
        .to_string_lossy()
        .into_owned()
}
fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

impl ShiftbotConfig {
    /// Load config from a TOML file with SHIFTBOT_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. SHIFTBOT_CONFIG env var
    ///   3. ~/.shiftbot/shiftbot.toml
    ///
    /// Nested keys use a double underscore: `SHIFTBOT_DISPATCH__POLL_INTERVAL_SECS=10`.
    /// A bare `TELEGRAM_TOKEN` fills in the bot token when none is configured.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("SHIFTBOT_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let mut config: ShiftbotConfig = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SHIFTBOT_").split("__"))
            .extract()
            .map_err(|e| ShiftbotError::Config(e.to_string()))?;

        if config.telegram.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
                config.telegram.bot_token = token;
            }
        }

        Ok(config)
    }

    pub fn timezone_resolver(&self) -> Result<TimezoneResolver> {
        Ok(TimezoneResolver::new(
            self.timezone.standard_offset_minutes,
            self.timezone.summer_offset_minutes,
        )?)
    }

    pub fn shift_calculator(&self) -> Result<ShiftCalculator> {
        let labels = self
            .shifts
            .labels
            .iter()
            .map(|l| ShiftLabel::from(l.as_str()))
            .collect();
        ShiftCalculator::new(
            labels,
            self.shifts.reference_date,
            self.shifts.day_start,
            self.shifts.night_start,
            self.timezone_resolver()?,
        )
    }

    /// Check everything a running bot needs, before any task is spawned.
    pub fn validate(&self) -> Result<()> {
        self.shift_calculator()?;
        if self.dispatch.fire_times.is_empty() {
            return Err(ShiftbotError::Config(
                "dispatch.fire_times must not be empty".to_string(),
            ));
        }
        if self.dispatch.poll_interval_secs == 0 {
            return Err(ShiftbotError::Config(
                "dispatch.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.dispatch.delivery_timeout_secs == 0 {
            return Err(ShiftbotError::Config(
                "dispatch.delivery_timeout_secs must be positive".to_string(),
            ));
        }
        if self.telegram.mode == UpdateMode::Webhook && self.telegram.webhook_url.is_none() {
            return Err(ShiftbotError::Config(
                "telegram.webhook_url is required in webhook mode".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.shiftbot/shiftbot.toml", home)
}
