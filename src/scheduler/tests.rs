use super::{restart_backoff, EodGate, Scheduler};
use crate::dispatch::{Dispatcher, MessageTransport};
use crate::error::{BotError, Result};
use crate::producers::{CheckProducer, ReportProducer};
use crate::store::SubscriberStore;
use crate::types::{AlertCategory, Notification, PreferenceKind, ReportData};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::watch;

fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap()
}

#[test]
fn eod_gate_fires_once_per_date() {
    let mut gate = EodGate::new("16:00".to_string());

    assert!(!gate.due(local(2025, 3, 10, 15, 59)));
    assert!(gate.due(local(2025, 3, 10, 16, 0)));

    gate.mark_sent(date(2025, 3, 10));
    assert!(!gate.due(local(2025, 3, 10, 16, 5)));
    assert!(!gate.due(local(2025, 3, 10, 23, 59)));

    // next calendar date triggers again
    assert!(gate.due(local(2025, 3, 11, 16, 0)));
}

#[test]
fn eod_gate_threshold_is_string_compared() {
    let gate = EodGate::new("09:30".to_string());

    assert!(!gate.due(local(2025, 3, 10, 9, 29)));
    assert!(gate.due(local(2025, 3, 10, 9, 30)));
    assert!(gate.due(local(2025, 3, 10, 23, 59)));
}

#[test]
fn restart_backoff_grows_with_attempts() {
    assert_eq!(restart_backoff(1), Duration::from_secs(60));
    assert_eq!(restart_backoff(3), Duration::from_secs(180));
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, _photo: &Path, caption: Option<&str>) -> Result<()> {
        self.sent
            .lock()
            .push((chat_id, caption.unwrap_or("").to_string()));
        Ok(())
    }
}

struct StaticChecks(Vec<Notification>);

#[async_trait]
impl CheckProducer for StaticChecks {
    async fn run_checks(&self) -> Result<Vec<Notification>> {
        Ok(self.0.clone())
    }
}

struct FailingChecks;

#[async_trait]
impl CheckProducer for FailingChecks {
    async fn run_checks(&self) -> Result<Vec<Notification>> {
        Err(BotError::Producer("analysis service unreachable".to_string()))
    }
}

struct StaticReport(Option<ReportData>);

#[async_trait]
impl ReportProducer for StaticReport {
    async fn build_eod_payload(&self) -> Result<Option<ReportData>> {
        Ok(self.0.clone())
    }

    async fn render_eod_html(&self, _report: &ReportData) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn format_eod_summary(&self, report: &ReportData) -> String {
        format!("EOD report for {}", report.date)
    }
}

fn report_data() -> ReportData {
    ReportData {
        date: date(2025, 3, 10),
        open_price: 2400.0,
        close_price: 2412.5,
        day_change_pct: 0.52,
        signal: None,
        top_news: Vec::new(),
        chart_path: None,
    }
}

fn scheduler_with(
    store: Arc<SubscriberStore>,
    transport: Arc<RecordingTransport>,
    checks: Arc<dyn CheckProducer>,
    reports: Arc<dyn ReportProducer>,
) -> (Scheduler<RecordingTransport>, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        store,
        Arc::new(Dispatcher::new(transport)),
        checks,
        reports,
        Duration::from_secs(600),
        "16:00".to_string(),
        rx,
    );
    (scheduler, tx)
}

#[tokio::test]
async fn eod_digest_goes_only_to_opted_in_subscribers() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SubscriberStore::load(dir.path().join("users.json")));
    store.register(1, Some("a".to_string()));
    store.register(2, Some("b".to_string()));
    store.set_preference(2, PreferenceKind::Eod, false).unwrap();

    let transport = Arc::new(RecordingTransport::default());
    let (scheduler, _tx) = scheduler_with(
        store,
        transport.clone(),
        Arc::new(StaticChecks(Vec::new())),
        Arc::new(StaticReport(Some(report_data()))),
    );

    scheduler.send_eod_digest().await;

    let sent = transport.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);
    assert!(sent[0].1.contains("EOD report"));
}

#[tokio::test]
async fn gate_blocks_second_digest_on_the_same_date() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SubscriberStore::load(dir.path().join("users.json")));
    store.register(1, None);

    let transport = Arc::new(RecordingTransport::default());
    let (scheduler, _tx) = scheduler_with(
        store,
        transport.clone(),
        Arc::new(StaticChecks(Vec::new())),
        Arc::new(StaticReport(Some(report_data()))),
    );

    // drive the gate exactly as the loop does: 16:00 fires, 16:05 does not
    let mut gate = EodGate::new("16:00".to_string());
    let first = local(2025, 3, 10, 16, 0);
    assert!(gate.due(first));
    scheduler.send_eod_digest().await;
    gate.mark_sent(first.date_naive());

    assert!(!gate.due(local(2025, 3, 10, 16, 5)));
    assert_eq!(transport.sent.lock().len(), 1);
}

#[tokio::test]
async fn missing_payload_skips_the_digest() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SubscriberStore::load(dir.path().join("users.json")));
    store.register(1, None);

    let transport = Arc::new(RecordingTransport::default());
    let (scheduler, _tx) = scheduler_with(
        store,
        transport.clone(),
        Arc::new(StaticChecks(Vec::new())),
        Arc::new(StaticReport(None)),
    );

    scheduler.send_eod_digest().await;
    assert!(transport.sent.lock().is_empty());
}

#[tokio::test]
async fn failing_check_producer_yields_empty_cycle() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SubscriberStore::load(dir.path().join("users.json")));
    store.register(1, None);

    let transport = Arc::new(RecordingTransport::default());
    let (scheduler, _tx) = scheduler_with(
        store,
        transport.clone(),
        Arc::new(FailingChecks),
        Arc::new(StaticReport(None)),
    );

    scheduler.run_check_cycle().await;
    assert!(transport.sent.lock().is_empty());
}

#[tokio::test]
async fn notifications_route_by_category() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SubscriberStore::load(dir.path().join("users.json")));
    store.register(1, None);
    store.register(2, None);
    store.set_preference(2, PreferenceKind::News, false).unwrap();

    let notification = Notification {
        category: AlertCategory::News,
        title: "Fed decision".to_string(),
        body: "Rates unchanged".to_string(),
        attachment: None,
    };
    let transport = Arc::new(RecordingTransport::default());
    let (scheduler, _tx) = scheduler_with(
        store,
        transport.clone(),
        Arc::new(StaticChecks(vec![notification])),
        Arc::new(StaticReport(None)),
    );

    scheduler.run_check_cycle().await;

    let sent = transport.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);
    assert!(sent[0].1.contains("Fed decision"));
}
