//! Environment-driven configuration
//!
//! All settings come from the process environment, optionally seeded from a
//! `.env` file. `BOT_TOKEN` is required; everything else has a default.

use crate::error::{BotError, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_EOD_REPORT_TIME: &str = "16:00";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_ANALYSIS_BASE_URL: &str = "http://127.0.0.1:8090";

/// Runtime configuration for the notifier daemon
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token from @BotFather
    pub bot_token: String,
    /// Seconds between check cycles
    pub check_interval_secs: u64,
    /// Wall-clock time of day ("HH:MM") for the end-of-day report
    pub eod_report_time: String,
    /// Directory holding the subscriber registry file
    pub data_dir: PathBuf,
    /// Base URL of the analysis service serving prices, signals, news and reports
    pub analysis_base_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = get("BOT_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| BotError::Config("BOT_TOKEN environment variable not set".to_string()))?;

        let check_interval_secs = match get("CHECK_INTERVAL") {
            Some(raw) => raw.parse().map_err(|_| {
                BotError::Config(format!(
                    "CHECK_INTERVAL must be a number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_CHECK_INTERVAL_SECS,
        };

        let eod_report_time =
            get("EOD_REPORT_TIME").unwrap_or_else(|| DEFAULT_EOD_REPORT_TIME.to_string());
        if !looks_like_hhmm(&eod_report_time) {
            tracing::warn!(
                "EOD_REPORT_TIME '{}' is not HH:MM, the daily report may never trigger",
                eod_report_time
            );
        }

        let data_dir = get("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let analysis_base_url =
            get("ANALYSIS_BASE_URL").unwrap_or_else(|| DEFAULT_ANALYSIS_BASE_URL.to_string());

        Ok(Self {
            bot_token,
            check_interval_secs,
            eod_report_time,
            data_dir,
            analysis_base_url,
        })
    }

    /// Path of the subscriber registry file
    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("telegram_users.json")
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// The report time is compared against the clock as a string, so only the
/// exact `HH:MM` shape behaves; anything else gets a startup warning.
pub(crate) fn looks_like_hhmm(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit())
}
