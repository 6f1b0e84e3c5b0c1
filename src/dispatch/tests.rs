use super::{Dispatcher, MessageTransport};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Transport fake that fails for a configured set of chats
#[derive(Default)]
struct FakeTransport {
    fail_for: Vec<i64>,
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl MessageTransport for FakeTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.fail_for.contains(&chat_id) {
            return Err(BotError::Api {
                status: 403,
                body: "bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, _photo: &Path, caption: Option<&str>) -> Result<()> {
        self.send_text(chat_id, caption.unwrap_or("")).await
    }
}

#[tokio::test]
async fn one_failure_does_not_abort_the_batch() {
    let transport = Arc::new(FakeTransport {
        fail_for: vec![2],
        ..Default::default()
    });
    let dispatcher = Dispatcher::new(transport.clone());

    let report = dispatcher.deliver_text(&[1, 2, 3], "hello").await;

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].chat_id, 2);
    assert!(report.failures[0].cause.contains("blocked"));
}

#[tokio::test]
async fn all_successes_make_a_clean_report() {
    let transport = Arc::new(FakeTransport::default());
    let dispatcher = Dispatcher::new(transport.clone());

    let report = dispatcher.deliver_text(&[1, 2, 3], "hello").await;

    assert!(report.is_clean());
    assert_eq!(report.success_count, 3);
    assert_eq!(transport.sent.lock().len(), 3);
}

#[tokio::test]
async fn missing_attachment_degrades_to_failures() {
    let transport = Arc::new(FakeTransport::default());
    let dispatcher = Dispatcher::new(transport.clone());

    let report = dispatcher
        .deliver_with_attachment(&[1, 2], "chart", Path::new("/nonexistent/chart.png"))
        .await;

    assert_eq!(report.success_count, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(transport.sent.lock().is_empty());
}

#[tokio::test]
async fn existing_attachment_is_sent_with_caption() {
    let dir = tempfile::tempdir().unwrap();
    let chart = dir.path().join("chart.png");
    std::fs::write(&chart, b"png").unwrap();

    let transport = Arc::new(FakeTransport::default());
    let dispatcher = Dispatcher::new(transport.clone());

    let report = dispatcher.deliver_with_attachment(&[5], "caption", &chart).await;

    assert_eq!(report.success_count, 1);
    assert_eq!(transport.sent.lock()[0], (5, "caption".to_string()));
}

struct SlowTransport;

#[async_trait]
impl MessageTransport for SlowTransport {
    async fn send_text(&self, chat_id: i64, _text: &str) -> Result<()> {
        if chat_id == 9 {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    async fn send_photo(&self, _chat_id: i64, _photo: &Path, _caption: Option<&str>) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn hung_send_times_out_without_stalling_others() {
    let dispatcher =
        Dispatcher::new(Arc::new(SlowTransport)).with_send_timeout(Duration::from_millis(50));

    let report = dispatcher.deliver_text(&[8, 9, 10], "ping").await;

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].chat_id, 9);
    assert!(report.failures[0].cause.contains("timed out"));
}
