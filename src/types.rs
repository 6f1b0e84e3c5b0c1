//! Shared domain types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Alert categories a subscriber can opt in or out of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Price,
    Signal,
    News,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertCategory::Price => "price",
            AlertCategory::Signal => "signal",
            AlertCategory::News => "news",
        };
        f.write_str(label)
    }
}

/// Preference flags addressable from toggle commands. The end-of-day report
/// is not a routed category, so it appears here but not in [`AlertCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKind {
    Price,
    Signal,
    News,
    Eod,
}

impl PreferenceKind {
    /// Human label used in toggle confirmations
    pub fn label(&self) -> &'static str {
        match self {
            PreferenceKind::Price => "Price alerts",
            PreferenceKind::Signal => "Signal alerts",
            PreferenceKind::News => "News alerts",
            PreferenceKind::Eod => "EOD reports",
        }
    }
}

/// Per-subscriber notification switches, all on by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSet {
    #[serde(default = "default_true")]
    pub price_alerts: bool,
    #[serde(default = "default_true")]
    pub signal_alerts: bool,
    #[serde(default = "default_true")]
    pub news_alerts: bool,
    #[serde(default = "default_true")]
    pub eod_reports: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            price_alerts: true,
            signal_alerts: true,
            news_alerts: true,
            eod_reports: true,
        }
    }
}

impl PreferenceSet {
    /// Whether the flag for the given alert category is on
    pub fn allows(&self, category: AlertCategory) -> bool {
        match category {
            AlertCategory::Price => self.price_alerts,
            AlertCategory::Signal => self.signal_alerts,
            AlertCategory::News => self.news_alerts,
        }
    }

    pub fn get(&self, kind: PreferenceKind) -> bool {
        match kind {
            PreferenceKind::Price => self.price_alerts,
            PreferenceKind::Signal => self.signal_alerts,
            PreferenceKind::News => self.news_alerts,
            PreferenceKind::Eod => self.eod_reports,
        }
    }

    pub fn set(&mut self, kind: PreferenceKind, value: bool) {
        match kind {
            PreferenceKind::Price => self.price_alerts = value,
            PreferenceKind::Signal => self.signal_alerts = value,
            PreferenceKind::News => self.news_alerts = value,
            PreferenceKind::Eod => self.eod_reports = value,
        }
    }
}

/// A registered notification recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: PreferenceSet,
}

/// A transient alert produced by an external check, routed then dropped
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub category: AlertCategory,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub attachment: Option<PathBuf>,
}

/// Technical snapshot returned by the signal producer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalSummary {
    /// -1 sell, 0 neutral, 1 buy
    pub signal_sign: i8,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
}

/// One news headline with its estimated market impact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub url: String,
    /// 0.0 ..= 1.0
    pub impact: f64,
}

/// Aggregated end-of-day payload from the report producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub date: NaiveDate,
    pub open_price: f64,
    pub close_price: f64,
    pub day_change_pct: f64,
    #[serde(default)]
    pub signal: Option<SignalSummary>,
    #[serde(default)]
    pub top_news: Vec<NewsItem>,
    #[serde(default)]
    pub chart_path: Option<PathBuf>,
}
