//! Error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("config error: {0}")]
    Config(String),

    #[error("chat {0} is not registered")]
    NotRegistered(i64),

    #[error("producer failure: {0}")]
    Producer(String),

    #[error("telegram api error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("attachment not found: {}", .0.display())]
    AttachmentMissing(std::path::PathBuf),

    #[error("send timed out after {0} seconds")]
    Timeout(u64),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
