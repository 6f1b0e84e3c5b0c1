//! Inbound command surface
//!
//! Maps Telegram commands and free-text replies to registry mutations and
//! on-demand report generation.

use crate::dispatch::{Dispatcher, MessageTransport};
use crate::error::BotError;
use crate::producers::ProducerSet;
use crate::store::SubscriberStore;
use crate::types::{NewsItem, PreferenceKind, PreferenceSet, SignalSummary};
use std::path::Path;
use std::sync::Arc;


const NEWS_LIMIT: usize = 5;

const NOT_REGISTERED_TEXT: &str = "You are not registered. Use /start to register.";

const HELP_TEXT: &str = "XAU/USD Trading Assistant Commands:\n\n\
    /price - Get the current gold price\n\
    /signal - Get the latest trading signal\n\
    /news - Get the latest gold news\n\
    /report - Get the latest EOD report\n\
    /settings - Manage notification settings\n\
    /help - Show this help message";

const WELCOME_TEXT: &str = "🎉 Welcome to the XAU/USD Trading Assistant! 🎉\n\n\
    I'll send you alerts for:\n\
    📈 Trading signals (Buy/Sell)\n\
    💰 Price movements\n\
    📰 Important gold-related news\n\
    📊 End-of-day reports\n\n\
    Use /help to see available commands.";

const WELCOME_BACK_TEXT: &str = "Welcome back to the XAU/USD Trading Assistant!\n\n\
    Use /help to see available commands.";

/// An inbound message with just enough context to reply
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub username: Option<String>,
    pub text: String,
}

/// Parsed command or free-text action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Price,
    Signal,
    News,
    Report,
    Settings,
    Toggle { kind: PreferenceKind, enabled: bool },
    Unknown,
}

impl Command {
    /// Parse a raw message. Commands start with `/` and may carry a trailing
    /// `@botname`, which is stripped. Free text is matched against the
    /// `<category> <on|off>` toggle form, case-insensitive.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('/') {
            let name = rest.split_whitespace().next().unwrap_or("");
            let name = name.split('@').next().unwrap_or(name);
            return match name.to_lowercase().as_str() {
                "start" => Command::Start,
                "help" => Command::Help,
                "price" => Command::Price,
                "signal" => Command::Signal,
                "news" => Command::News,
                "report" => Command::Report,
                "settings" => Command::Settings,
                _ => Command::Unknown,
            };
        }
        Self::parse_toggle(text).unwrap_or(Command::Unknown)
    }

    fn parse_toggle(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let kind = match tokens.next()?.to_lowercase().as_str() {
            "price" => PreferenceKind::Price,
            "signal" => PreferenceKind::Signal,
            "news" => PreferenceKind::News,
            "eod" => PreferenceKind::Eod,
            _ => return None,
        };
        let enabled = match tokens.next()?.to_lowercase().as_str() {
            "on" => true,
            "off" => false,
            _ => return None,
        };
        Some(Command::Toggle { kind, enabled })
    }
}

/// Handles parsed commands against the registry and producers
pub struct CommandRouter<T: MessageTransport> {
    store: Arc<SubscriberStore>,
    dispatcher: Arc<Dispatcher<T>>,
    producers: ProducerSet,
}

impl<T: MessageTransport> CommandRouter<T> {
    pub fn new(
        store: Arc<SubscriberStore>,
        dispatcher: Arc<Dispatcher<T>>,
        producers: ProducerSet,
    ) -> Self {
        Self {
            store,
            dispatcher,
            producers,
        }
    }

    /// Entry point for one inbound message
    pub async fn handle(&self, msg: IncomingMessage) {
        tracing::info!("Handling message from chat {}: {}", msg.chat_id, msg.text);
        match Command::parse(&msg.text) {
            Command::Start => self.handle_start(&msg).await,
            Command::Help => self.reply(msg.chat_id, HELP_TEXT).await,
            Command::Price => self.handle_price(&msg).await,
            Command::Signal => self.handle_signal(&msg).await,
            Command::News => self.handle_news(&msg).await,
            Command::Report => self.handle_report(&msg).await,
            Command::Settings => self.handle_settings(&msg).await,
            Command::Toggle { kind, enabled } => self.handle_toggle(&msg, kind, enabled).await,
            Command::Unknown => {
                self.reply(
                    msg.chat_id,
                    "I don't understand that. Use /help to see available commands.",
                )
                .await
            }
        }
    }

    /// Reply to the single requesting chat through the shared dispatcher
    async fn reply(&self, chat_id: i64, text: &str) {
        let _ = self.dispatcher.deliver_text(&[chat_id], text).await;
    }

    async fn reply_with_photo(&self, chat_id: i64, caption: &str, photo: &Path) {
        let _ = self
            .dispatcher
            .deliver_with_attachment(&[chat_id], caption, photo)
            .await;
    }

    async fn handle_start(&self, msg: &IncomingMessage) {
        let created = self.store.register(msg.chat_id, msg.username.clone());
        let text = if created { WELCOME_TEXT } else { WELCOME_BACK_TEXT };
        self.reply(msg.chat_id, text).await;
    }

    async fn handle_price(&self, msg: &IncomingMessage) {
        self.reply(msg.chat_id, "Fetching current gold price...").await;

        let price = match self.producers.market.fetch_current_price().await {
            Ok(price) => price,
            Err(e) => {
                tracing::error!("Price command failed: {}", e);
                self.reply(msg.chat_id, &format!("Error fetching price: {}", e))
                    .await;
                return;
            }
        };

        let caption = format!("💰 Current XAU/USD Price: ${:.2}", price);
        match self.producers.market.render_price_chart().await {
            Ok(chart) => self.reply_with_photo(msg.chat_id, &caption, &chart).await,
            Err(e) => {
                tracing::warn!("Price chart unavailable: {}", e);
                self.reply(msg.chat_id, &caption).await;
            }
        }
    }

    async fn handle_signal(&self, msg: &IncomingMessage) {
        self.reply(msg.chat_id, "Generating latest trading signal...")
            .await;

        let summary = match self.producers.signals.generate_signal().await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Signal command failed: {}", e);
                self.reply(msg.chat_id, "Failed to generate trading signals.")
                    .await;
                return;
            }
        };

        let price = self.producers.market.fetch_current_price().await.ok();
        let text = format_signal_message(&summary, price);
        match self.producers.signals.render_signal_chart().await {
            Ok(chart) => self.reply_with_photo(msg.chat_id, &text, &chart).await,
            Err(e) => {
                tracing::warn!("Signal chart unavailable: {}", e);
                self.reply(msg.chat_id, &text).await;
            }
        }
    }

    async fn handle_news(&self, msg: &IncomingMessage) {
        self.reply(msg.chat_id, "Fetching latest gold news...").await;

        let items = match self.producers.news.fetch_latest(NEWS_LIMIT).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("News command failed: {}", e);
                self.reply(msg.chat_id, &format!("Error fetching news: {}", e))
                    .await;
                return;
            }
        };

        if items.is_empty() {
            self.reply(msg.chat_id, "No gold-related news found.").await;
            return;
        }
        self.reply(msg.chat_id, &format_news_message(&items)).await;
    }

    async fn handle_report(&self, msg: &IncomingMessage) {
        self.reply(msg.chat_id, "Generating EOD report...").await;

        let payload = match self.producers.reports.build_eod_payload().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.reply(msg.chat_id, "Failed to generate EOD report.").await;
                return;
            }
            Err(e) => {
                tracing::error!("Report command failed: {}", e);
                self.reply(msg.chat_id, "Failed to generate EOD report.").await;
                return;
            }
        };

        if let Err(e) = self.producers.reports.render_eod_html(&payload).await {
            tracing::warn!("EOD HTML render failed: {}", e);
        }

        let summary = self.producers.reports.format_eod_summary(&payload);
        self.reply(msg.chat_id, &summary).await;

        if let Some(chart) = &payload.chart_path {
            self.reply_with_photo(msg.chat_id, "EOD Chart", chart).await;
        }
    }

    async fn handle_settings(&self, msg: &IncomingMessage) {
        let Some(subscriber) = self.store.find(msg.chat_id) else {
            self.reply(msg.chat_id, NOT_REGISTERED_TEXT).await;
            return;
        };
        self.reply(msg.chat_id, &format_settings_message(&subscriber.settings))
            .await;
    }

    async fn handle_toggle(&self, msg: &IncomingMessage, kind: PreferenceKind, enabled: bool) {
        match self.store.set_preference(msg.chat_id, kind, enabled) {
            Ok(()) => {
                let state = if enabled { "ON" } else { "OFF" };
                self.reply(msg.chat_id, &format!("{} turned {}", kind.label(), state))
                    .await;
            }
            Err(BotError::NotRegistered(_)) => {
                self.reply(msg.chat_id, NOT_REGISTERED_TEXT).await;
            }
            Err(e) => {
                tracing::error!("Failed to update settings for chat {}: {}", msg.chat_id, e);
                self.reply(msg.chat_id, "Failed to update settings, please try again.")
                    .await;
            }
        }
    }
}

fn format_signal_message(summary: &SignalSummary, price: Option<f64>) -> String {
    let label = match summary.signal_sign {
        s if s > 0 => "🟢 BUY",
        s if s < 0 => "🔴 SELL",
        _ => "⚪ NEUTRAL",
    };

    let mut text = format!("📊 XAU/USD Trading Signal: {}\n\n", label);
    if let Some(price) = price {
        text.push_str(&format!("💰 Current Price: ${:.2}\n", price));
    }
    text.push_str(&format!(
        "📈 RSI: {:.2}\n📉 MACD: {:.2}\n\n",
        summary.rsi, summary.macd
    ));

    if summary.rsi > 70.0 {
        text.push_str("RSI indicates OVERBOUGHT conditions.\n");
    } else if summary.rsi < 30.0 {
        text.push_str("RSI indicates OVERSOLD conditions.\n");
    }

    if summary.macd > summary.macd_signal {
        text.push_str("MACD is BULLISH (MACD line above Signal line).\n");
    } else {
        text.push_str("MACD is BEARISH (MACD line below Signal line).\n");
    }

    text
}

fn format_news_message(items: &[NewsItem]) -> String {
    let mut text = String::from("📰 Latest Gold News:\n\n");
    for (i, item) in items.iter().enumerate() {
        let impact = if item.impact >= 0.8 {
            "🔴 High"
        } else if item.impact >= 0.6 {
            "🟠 Medium"
        } else {
            "🟡 Low"
        };
        text.push_str(&format!(
            "{}. [{}] {}\n   Impact: {} ({:.2})\n   {}\n\n",
            i + 1,
            item.source,
            item.title,
            impact,
            item.impact,
            item.url
        ));
    }
    text
}

fn format_settings_message(settings: &PreferenceSet) -> String {
    let state = |on: bool| if on { "✅ ON" } else { "❌ OFF" };
    format!(
        "🔧 Notification Settings:\n\n\
         Price Alerts: {}\n\
         Signal Alerts: {}\n\
         News Alerts: {}\n\
         EOD Reports: {}\n\n\
         To change a setting, reply with:\n\
         price on/off\n\
         signal on/off\n\
         news on/off\n\
         eod on/off",
        state(settings.price_alerts),
        state(settings.signal_alerts),
        state(settings.news_alerts),
        state(settings.eod_reports),
    )
}
