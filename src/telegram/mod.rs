//! Telegram Bot API transport
//!
//! Plain HTTP against api.telegram.org: sendMessage/sendPhoto for outbound
//! traffic and getUpdates long-polling for inbound commands.

use crate::commands::{CommandRouter, IncomingMessage};
use crate::dispatch::MessageTransport;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

const API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 30;
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_SECS: u64 = 5;

/// Minimal Bot API client
pub struct TelegramApi {
    http: reqwest::Client,
    bot_token: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct GetUpdatesResponse {
    ok: bool,
    result: Vec<TelegramUpdate>,
}

impl TelegramApi {
    pub fn new(bot_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.bot_token, method)
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let url = format!(
            "{}?offset={}&timeout={}",
            self.method_url("getUpdates"),
            offset,
            POLL_TIMEOUT_SECS
        );

        let response: GetUpdatesResponse = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await?
            .json()
            .await?;

        Ok(response.result)
    }

    async fn check_response(response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BotError::Api { status, body })
    }
}

#[async_trait]
impl MessageTransport for TelegramApi {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn send_photo(&self, chat_id: i64, photo: &Path, caption: Option<&str>) -> Result<()> {
        let bytes = tokio::fs::read(photo).await?;
        let file_name = photo
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string());

        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .http
            .post(self.method_url("sendPhoto"))
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .multipart(form)
            .send()
            .await?;
        Self::check_response(response).await
    }
}

/// Polls getUpdates and feeds incoming messages to the command surface
pub struct UpdateListener {
    api: Arc<TelegramApi>,
    router: Arc<CommandRouter<TelegramApi>>,
    last_update_id: RwLock<i64>,
}

impl UpdateListener {
    pub fn new(api: Arc<TelegramApi>, router: Arc<CommandRouter<TelegramApi>>) -> Self {
        Self {
            api,
            router,
            last_update_id: RwLock::new(0),
        }
    }

    /// Poll until shutdown. Transient API errors are logged and retried
    /// after a short pause.
    pub async fn start_polling(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Starting Telegram update listener...");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let offset = *self.last_update_id.read().await + 1;

            let updates = tokio::select! {
                result = self.api.get_updates(offset) => result,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        *self.last_update_id.write().await = update.update_id;
                        if let Some(message) = update.message {
                            self.dispatch_message(message).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to poll Telegram updates: {}", e);
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                }
            }
        }

        tracing::info!("Telegram update listener stopped");
    }

    async fn dispatch_message(&self, message: TelegramMessage) {
        let Some(text) = message.text else {
            return;
        };
        let incoming = IncomingMessage {
            chat_id: message.chat.id,
            username: message.from.and_then(|user| user.username),
            text,
        };
        self.router.handle(incoming).await;
    }
}
