//! Scheduling loop
//!
//! Drives periodic check cycles and the once-per-day EOD digest, with
//! bounded crash recovery around the whole loop.

use crate::dispatch::{Dispatcher, MessageTransport};
use crate::error::Result;
use crate::producers::{CheckProducer, ReportProducer};
use crate::router;
use crate::store::SubscriberStore;
use crate::types::Notification;
use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[cfg(test)]
mod tests;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
const RESTART_BACKOFF_BASE_SECS: u64 = 60;

/// Tracks whether the end-of-day digest is due.
///
/// The threshold is compared lexicographically as an `HH:MM` string, matching
/// the clock's `%H:%M` rendering. The watermark holds the last date a digest
/// went out and lives only in memory: a restart after a sent digest can
/// repeat it once, which is accepted.
#[derive(Debug)]
pub struct EodGate {
    report_time: String,
    last_sent: Option<NaiveDate>,
}

impl EodGate {
    pub fn new(report_time: String) -> Self {
        Self {
            report_time,
            last_sent: None,
        }
    }

    /// True the first time a sample lands at or past the threshold on a date
    /// the digest has not been sent for.
    pub fn due(&self, now: DateTime<Local>) -> bool {
        let time_of_day = now.format("%H:%M").to_string();
        time_of_day.as_str() >= self.report_time.as_str()
            && self.last_sent != Some(now.date_naive())
    }

    pub fn mark_sent(&mut self, date: NaiveDate) {
        self.last_sent = Some(date);
    }
}

pub(crate) fn restart_backoff(attempt: u32) -> Duration {
    Duration::from_secs(RESTART_BACKOFF_BASE_SECS * attempt as u64)
}

/// The scheduling loop: check cycles, the daily digest and crash recovery
pub struct Scheduler<T: MessageTransport> {
    store: Arc<SubscriberStore>,
    dispatcher: Arc<Dispatcher<T>>,
    checks: Arc<dyn CheckProducer>,
    reports: Arc<dyn ReportProducer>,
    check_interval: Duration,
    eod_report_time: String,
    shutdown: watch::Receiver<bool>,
}

impl<T: MessageTransport> Scheduler<T> {
    pub fn new(
        store: Arc<SubscriberStore>,
        dispatcher: Arc<Dispatcher<T>>,
        checks: Arc<dyn CheckProducer>,
        reports: Arc<dyn ReportProducer>,
        check_interval: Duration,
        eod_report_time: String,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            checks,
            reports,
            check_interval,
            eod_report_time,
            shutdown,
        }
    }

    /// Run the loop under a bounded restart budget, backing off
    /// `60 * attempt` seconds between restarts. Exhausting the budget is
    /// fatal and surfaces as a nonzero process exit.
    pub async fn run_supervised(&self, max_retries: u32) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.run().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    tracing::error!(
                        "Scheduler loop failed (attempt {}/{}): {}",
                        attempt,
                        max_retries,
                        e
                    );
                    if attempt >= max_retries {
                        tracing::error!("Maximum retries reached, giving up");
                        return Err(e);
                    }
                    let backoff = restart_backoff(attempt);
                    tracing::info!("Restarting scheduler in {} seconds...", backoff.as_secs());
                    if self.wait_or_shutdown(backoff).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One continuous monitoring run. Returns `Ok` on clean shutdown; any
    /// error escaping the loop body lands in `run_supervised`.
    async fn run(&self) -> Result<()> {
        tracing::info!(
            "Starting continuous monitoring every {} seconds (EOD report at {})",
            self.check_interval.as_secs(),
            self.eod_report_time
        );
        let mut gate = EodGate::new(self.eod_report_time.clone());

        loop {
            if *self.shutdown.borrow() {
                tracing::info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }

            self.run_check_cycle().await;

            let now = Local::now();
            if gate.due(now) {
                self.send_eod_digest().await;
                gate.mark_sent(now.date_naive());
            }

            tracing::debug!("Sleeping for {} seconds...", self.check_interval.as_secs());
            if self.wait_or_shutdown(self.check_interval).await {
                tracing::info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }
        }
    }

    /// Sleep for `duration`, returning `true` early when shutdown fires.
    async fn wait_or_shutdown(&self, duration: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }

    /// One check cycle: pull pending notifications and fan each out. A
    /// producer failure yields an empty cycle, never a dead loop.
    pub async fn run_check_cycle(&self) {
        tracing::info!("Running check cycle...");
        let notifications = match self.checks.run_checks().await {
            Ok(notifications) => notifications,
            Err(e) => {
                tracing::error!("Check producer failed: {}", e);
                Vec::new()
            }
        };

        if notifications.is_empty() {
            tracing::info!("No notifications generated");
            return;
        }

        tracing::info!("Generated {} notification(s)", notifications.len());
        for notification in &notifications {
            self.send_notification(notification).await;
        }
    }

    async fn send_notification(&self, notification: &Notification) {
        let recipients = router::eligible(notification.category, &self.store.all());
        if recipients.is_empty() {
            tracing::info!(
                "No subscribers opted in for {} alert '{}'",
                notification.category,
                notification.title
            );
            return;
        }
        let chat_ids: Vec<i64> = recipients.iter().map(|s| s.chat_id).collect();

        let text = format!("🔔 {}\n\n{}", notification.title, notification.body);
        let report = self.dispatcher.deliver_text(&chat_ids, &text).await;
        tracing::info!(
            "Delivered {} alert '{}' to {}/{} subscriber(s)",
            notification.category,
            notification.title,
            report.success_count,
            chat_ids.len()
        );

        if let Some(attachment) = &notification.attachment {
            let report = self
                .dispatcher
                .deliver_with_attachment(&chat_ids, &notification.title, attachment)
                .await;
            if !report.is_clean() {
                tracing::warn!(
                    "Chart delivery failed for {} subscriber(s)",
                    report.failures.len()
                );
            }
        }
    }

    /// Build and fan out the end-of-day digest to opted-in subscribers.
    pub async fn send_eod_digest(&self) {
        tracing::info!("Generating EOD report...");
        let payload = match self.reports.build_eod_payload().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::warn!("No EOD report data available");
                return;
            }
            Err(e) => {
                tracing::error!("EOD report producer failed: {}", e);
                return;
            }
        };

        // chats receive the text summary and chart; the HTML artifact only
        // lands on disk for the archive
        if let Err(e) = self.reports.render_eod_html(&payload).await {
            tracing::warn!("EOD HTML render failed: {}", e);
        }

        let recipients = router::eod_recipients(&self.store.all());
        if recipients.is_empty() {
            tracing::info!("No subscribers opted in for EOD reports");
            return;
        }
        let chat_ids: Vec<i64> = recipients.iter().map(|s| s.chat_id).collect();

        let summary = self.reports.format_eod_summary(&payload);
        let report = self.dispatcher.deliver_text(&chat_ids, &summary).await;
        tracing::info!(
            "Delivered EOD report to {}/{} subscriber(s)",
            report.success_count,
            chat_ids.len()
        );

        if let Some(chart) = &payload.chart_path {
            let report = self
                .dispatcher
                .deliver_with_attachment(&chat_ids, "EOD Chart", chart)
                .await;
            if !report.is_clean() {
                tracing::warn!(
                    "EOD chart delivery failed for {} subscriber(s)",
                    report.failures.len()
                );
            }
        }
    }
}
