//! Fan-out delivery
//!
//! Sends one rendered message to many chats, isolating per-recipient
//! failures. Retry policy lives with the scheduler; this layer reports and
//! moves on.

use crate::error::{BotError, Result};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
mod tests;

const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Outbound message channel the dispatcher fans out over
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
    async fn send_photo(&self, chat_id: i64, photo: &Path, caption: Option<&str>) -> Result<()>;
}

/// Outcome of one fan-out batch
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub success_count: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single failed send, kept for diagnostics
#[derive(Debug)]
pub struct DeliveryFailure {
    pub chat_id: i64,
    pub cause: String,
}

/// Delivers rendered messages to lists of chats with bounded concurrency.
/// A hung transport call is cut off by the per-send timeout so it cannot
/// stall the rest of the batch.
pub struct Dispatcher<T: MessageTransport> {
    transport: Arc<T>,
    concurrency: usize,
    send_timeout: Duration,
}

impl<T: MessageTransport> Dispatcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            concurrency: DEFAULT_CONCURRENCY,
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Send `text` to every chat independently.
    pub async fn deliver_text(&self, recipients: &[i64], text: &str) -> DeliveryReport {
        self.run_batch(recipients, |chat_id| {
            let transport = Arc::clone(&self.transport);
            let text = text.to_string();
            async move { transport.send_text(chat_id, &text).await }
        })
        .await
    }

    /// Send a photo with `caption` to every chat independently. The
    /// attachment is re-checked before each send: generated charts are
    /// transient and may be gone by the time a batch drains.
    pub async fn deliver_with_attachment(
        &self,
        recipients: &[i64],
        caption: &str,
        attachment: &Path,
    ) -> DeliveryReport {
        self.run_batch(recipients, |chat_id| {
            let transport = Arc::clone(&self.transport);
            let caption = caption.to_string();
            let attachment = attachment.to_path_buf();
            async move {
                if !attachment.exists() {
                    return Err(BotError::AttachmentMissing(attachment));
                }
                transport
                    .send_photo(chat_id, &attachment, Some(&caption))
                    .await
            }
        })
        .await
    }

    async fn run_batch<F, Fut>(&self, recipients: &[i64], make_send: F) -> DeliveryReport
    where
        F: Fn(i64) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let timeout = self.send_timeout;
        let results = stream::iter(recipients.iter().copied())
            .map(|chat_id| {
                let send = make_send(chat_id);
                async move {
                    match tokio::time::timeout(timeout, send).await {
                        Ok(outcome) => (chat_id, outcome),
                        Err(_) => (chat_id, Err(BotError::Timeout(timeout.as_secs()))),
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<(i64, Result<()>)>>()
            .await;

        let mut report = DeliveryReport::default();
        for (chat_id, outcome) in results {
            match outcome {
                Ok(()) => report.success_count += 1,
                Err(e) => {
                    tracing::error!("Delivery to chat {} failed: {}", chat_id, e);
                    report.failures.push(DeliveryFailure {
                        chat_id,
                        cause: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
