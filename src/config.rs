//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for Telegram credentials and the admin password.
//! Every section has defaults, so `{}` is a valid configuration file.

use anyhow::{Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::InstrumentKey;

/// Upper bound for every cooldown and window, one year
const MAX_WINDOW_HOURS: i64 = 24 * 366;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub indicator: IndicatorConfig,
    pub alerts: AlertConfig,
    pub schedule: ScheduleConfig,
    pub telegram: TelegramConfig,
    pub admin: AdminConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay credentials and deployment settings from the environment
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Ok(ids) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram.fallback_chat_ids = ids
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
        if let Ok(group) = std::env::var("TELEGRAM_REPORT_GROUP_ID") {
            self.telegram.report_group_id = Some(group);
        }
        if let Ok(thread) = std::env::var("TELEGRAM_THREAD_ID") {
            self.telegram.thread_id = thread.trim().parse().ok();
        }
        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            self.admin.password = password;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Reject configurations the scanner cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scan.symbols.is_empty() {
            anyhow::bail!("scan.symbols must list at least one instrument");
        }
        if self.scan.timeframes.is_empty() {
            anyhow::bail!("scan.timeframes must list at least one timeframe");
        }
        if self.indicator.rsi_period == 0 || self.indicator.smoothing_period == 0 {
            anyhow::bail!("indicator periods must be positive");
        }
        if self.indicator.curve_window < 2 {
            anyhow::bail!("indicator.curve_window must be at least 2");
        }
        if !(0.0..=1.0).contains(&self.indicator.curve_threshold) {
            anyhow::bail!("indicator.curve_threshold must be within [0, 1]");
        }
        if self.indicator.macro_lookback == 0 {
            anyhow::bail!("indicator.macro_lookback must be positive");
        }
        if self.alerts.history_capacity == 0 {
            anyhow::bail!("alerts.history_capacity must be positive");
        }
        if self.alerts.consolidated_min_instruments == 0 {
            anyhow::bail!("alerts.consolidated_min_instruments must be positive");
        }
        let windows = [
            (
                "alerts.instrument_cooldown_hours",
                self.alerts.instrument_cooldown_hours,
                MAX_WINDOW_HOURS,
            ),
            (
                "alerts.general_cooldown_hours",
                self.alerts.general_cooldown_hours,
                MAX_WINDOW_HOURS,
            ),
            (
                "alerts.terrain_window_minutes",
                self.alerts.terrain_window_minutes,
                MAX_WINDOW_HOURS * 60,
            ),
            (
                "alerts.consolidated_direction_cooldown_minutes",
                self.alerts.consolidated_direction_cooldown_minutes,
                MAX_WINDOW_HOURS * 60,
            ),
        ];
        for (name, value, max) in windows {
            if !(1..=max).contains(&value) {
                anyhow::bail!("{} must be within [1, {}], got {}", name, max, value);
            }
        }
        if self.schedule.shutdown_hour > 23 || self.schedule.shutdown_minute > 59 {
            anyhow::bail!(
                "schedule shutdown time {}:{} is not a valid time of day",
                self.schedule.shutdown_hour,
                self.schedule.shutdown_minute
            );
        }
        self.schedule
            .tz()
            .with_context(|| format!("Invalid schedule timezone {}", self.schedule.timezone))?;
        Ok(())
    }
}

/// Which instruments are scanned and how often
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,
    /// Higher timeframe used for macro confirmation
    pub macro_timeframe: String,
    pub check_interval_secs: u64,
    /// Pause before every upstream request
    pub request_delay_ms: u64,
    pub fetch_limit: u32,
    /// Symbols only listed on the futures market
    pub futures_only: Vec<String>,
    pub categories: HashMap<String, Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let large = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT"];
        let mid = ["DOGEUSDT", "AVAXUSDT", "ADAUSDT"];
        let small = ["RENDERUSDT", "NEARUSDT", "WLDUSDT", "SUIUSDT"];

        let mut categories = HashMap::new();
        categories.insert("Large Caps".to_string(), owned(&large));
        categories.insert("Mid Caps".to_string(), owned(&mid));
        categories.insert("Small Caps".to_string(), owned(&small));

        ScanConfig {
            symbols: [owned(&large), owned(&mid), owned(&small)].concat(),
            timeframes: vec!["2h".to_string()],
            macro_timeframe: "4h".to_string(),
            check_interval_secs: 180,
            request_delay_ms: 250,
            fetch_limit: 100,
            futures_only: vec!["PIPPINUSDT".to_string()],
            categories,
        }
    }
}

fn owned(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

impl ScanConfig {
    /// Every (instrument, timeframe) pair in scan order
    pub fn keys(&self) -> Vec<InstrumentKey> {
        self.symbols
            .iter()
            .flat_map(|s| self.timeframes.iter().map(move |t| InstrumentKey::new(s, t)))
            .collect()
    }

    /// Display category of `symbol`, if it belongs to one
    pub fn category_of(&self, symbol: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == symbol))
            .map(|(name, _)| name.as_str())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

/// Smoothed-RSI parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub smoothing_period: usize,
    pub min_closes: usize,
    pub min_smoothed: usize,
    pub curve_window: usize,
    /// Share of same-direction steps needed to call the curve UP or DOWN
    pub curve_threshold: f64,
    /// Number of consecutive higher-timeframe slopes that must agree
    pub macro_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            rsi_period: 20,
            smoothing_period: 20,
            min_closes: 50,
            min_smoothed: 20,
            curve_window: 10,
            curve_threshold: 0.9,
            macro_lookback: 3,
        }
    }
}

/// Cooldowns and thresholds for individual and consolidated alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub instrument_cooldown_hours: i64,
    pub terrain_window_minutes: i64,
    pub consolidated_min_instruments: usize,
    pub consolidated_direction_cooldown_minutes: i64,
    pub general_cooldown_hours: i64,
    pub history_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            instrument_cooldown_hours: 12,
            terrain_window_minutes: 60,
            consolidated_min_instruments: 3,
            consolidated_direction_cooldown_minutes: 60,
            general_cooldown_hours: 12,
            history_capacity: 20,
        }
    }
}

impl AlertConfig {
    pub fn instrument_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.instrument_cooldown_hours)
    }

    pub fn terrain_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.terrain_window_minutes)
    }

    pub fn direction_cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.consolidated_direction_cooldown_minutes)
    }

    pub fn general_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.general_cooldown_hours)
    }
}

/// Weekly shutdown window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// IANA timezone name the schedule is evaluated in
    pub timezone: String,
    pub shutdown_weekday: Weekday,
    pub shutdown_hour: u32,
    pub shutdown_minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            enabled: true,
            timezone: "America/Lima".to_string(),
            shutdown_weekday: Weekday::Fri,
            shutdown_hour: 15,
            shutdown_minute: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

/// Telegram delivery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Recipients that receive everything unless they have a stored preference
    pub fallback_chat_ids: Vec<String>,
    pub report_group_id: Option<String>,
    /// Forum thread used when posting to the report group
    pub thread_id: Option<i64>,
    /// Stored preferences: chat id -> subscribed instruments
    pub subscriptions: HashMap<String, Vec<String>>,
}

/// Admin actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    #[serde(skip_serializing)]
    pub password: String,
    /// Whether the scan loop starts unpaused
    pub start_active: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            password: "awd ".to_string(),
            start_active: true,
        }
    }
}

/// JSON API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            enabled: true,
            port: 3000,
        }
    }
}
