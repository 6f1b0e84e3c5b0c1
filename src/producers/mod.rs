//! External producer interfaces
//!
//! Price data, indicator signals, news and end-of-day reports come from the
//! analysis service. The daemon only decides whether, to whom and when to
//! deliver what these produce; indicator math, chart rendering and HTML
//! report generation all live on the other side of these traits.

mod rest;

pub use rest::AnalysisClient;

use crate::error::Result;
use crate::types::{NewsItem, Notification, ReportData, SignalSummary};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Spot price and price chart
#[async_trait]
pub trait MarketDataProducer: Send + Sync {
    async fn fetch_current_price(&self) -> Result<f64>;
    async fn render_price_chart(&self) -> Result<PathBuf>;
}

/// Technical indicator snapshot and indicator chart
#[async_trait]
pub trait SignalProducer: Send + Sync {
    async fn generate_signal(&self) -> Result<SignalSummary>;
    async fn render_signal_chart(&self) -> Result<PathBuf>;
}

/// Market-moving headlines
#[async_trait]
pub trait NewsProducer: Send + Sync {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<NewsItem>>;
}

/// End-of-day aggregates
#[async_trait]
pub trait ReportProducer: Send + Sync {
    /// `None` when there is not enough data to report on
    async fn build_eod_payload(&self) -> Result<Option<ReportData>>;
    /// Renders the HTML artifact, returning its path
    async fn render_eod_html(&self, report: &ReportData) -> Result<Option<PathBuf>>;
    /// Plain-text summary for the chat message
    fn format_eod_summary(&self, report: &ReportData) -> String;
}

/// Source of pending alert notifications for a check cycle
#[async_trait]
pub trait CheckProducer: Send + Sync {
    async fn run_checks(&self) -> Result<Vec<Notification>>;
}

/// Bundle of producer handles shared by the scheduler and command surface
#[derive(Clone)]
pub struct ProducerSet {
    pub market: Arc<dyn MarketDataProducer>,
    pub signals: Arc<dyn SignalProducer>,
    pub news: Arc<dyn NewsProducer>,
    pub reports: Arc<dyn ReportProducer>,
    pub checks: Arc<dyn CheckProducer>,
}

impl ProducerSet {
    /// Wire every interface to the one analysis service client
    pub fn from_client(client: Arc<AnalysisClient>) -> Self {
        Self {
            market: client.clone(),
            signals: client.clone(),
            news: client.clone(),
            reports: client.clone(),
            checks: client,
        }
    }
}
