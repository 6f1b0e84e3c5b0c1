//! REST adapter for the analysis service
//!
//! Thin typed client over the service's JSON endpoints. Chart and report
//! artifacts are exchanged by path on the shared filesystem.

use super::{CheckProducer, MarketDataProducer, NewsProducer, ReportProducer, SignalProducer};
use crate::error::{BotError, Result};
use crate::types::{NewsItem, Notification, ReportData, SignalSummary};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the analysis service that owns market data and reporting
pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    path: PathBuf,
}

impl AnalysisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(endpoint))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;
        Self::parse(endpoint, response).await
    }

    async fn parse<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Producer(format!(
                "{} returned HTTP {}: {}",
                endpoint, status, body
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketDataProducer for AnalysisClient {
    async fn fetch_current_price(&self) -> Result<f64> {
        let response: PriceResponse = self.get_json("price").await?;
        Ok(response.price)
    }

    async fn render_price_chart(&self) -> Result<PathBuf> {
        let response: ChartResponse = self.get_json("charts/price").await?;
        Ok(response.path)
    }
}

#[async_trait]
impl SignalProducer for AnalysisClient {
    async fn generate_signal(&self) -> Result<SignalSummary> {
        self.get_json("signal").await
    }

    async fn render_signal_chart(&self) -> Result<PathBuf> {
        let response: ChartResponse = self.get_json("charts/signal").await?;
        Ok(response.path)
    }
}

#[async_trait]
impl NewsProducer for AnalysisClient {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<NewsItem>> {
        self.get_json(&format!("news?limit={}", limit)).await
    }
}

#[async_trait]
impl ReportProducer for AnalysisClient {
    async fn build_eod_payload(&self) -> Result<Option<ReportData>> {
        self.get_json("report/eod").await
    }

    async fn render_eod_html(&self, report: &ReportData) -> Result<Option<PathBuf>> {
        let response = self
            .http
            .post(self.url("report/eod/html"))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(report)
            .send()
            .await?;
        let rendered: Option<ChartResponse> = Self::parse("report/eod/html", response).await?;
        Ok(rendered.map(|chart| chart.path))
    }

    fn format_eod_summary(&self, report: &ReportData) -> String {
        format_summary(report)
    }
}

#[async_trait]
impl CheckProducer for AnalysisClient {
    async fn run_checks(&self) -> Result<Vec<Notification>> {
        self.get_json("alerts/pending").await
    }
}

fn format_summary(report: &ReportData) -> String {
    let direction = if report.day_change_pct >= 0.0 {
        "📈"
    } else {
        "📉"
    };
    let mut text = format!(
        "📊 XAU/USD End-of-Day Report ({})\n\n\
         💰 Open: ${:.2}\n\
         💰 Close: ${:.2}\n\
         {} Day Change: {:+.2}%\n",
        report.date, report.open_price, report.close_price, direction, report.day_change_pct
    );

    if let Some(signal) = &report.signal {
        let label = match signal.signal_sign {
            s if s > 0 => "🟢 BUY",
            s if s < 0 => "🔴 SELL",
            _ => "⚪ NEUTRAL",
        };
        text.push_str(&format!(
            "\n📌 Latest Signal: {}\n📈 RSI: {:.2}\n📉 MACD: {:.2}\n",
            label, signal.rsi, signal.macd
        ));
    }

    if !report.top_news.is_empty() {
        text.push_str("\n📰 Top News:\n");
        for item in &report.top_news {
            text.push_str(&format!("• [{}] {}\n", item.source, item.title));
        }
    }

    text
}
