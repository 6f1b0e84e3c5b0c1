//! Preference routing
//!
//! Pure selection of which subscribers a notification reaches. No I/O.

use crate::types::{AlertCategory, Subscriber};

/// Subscribers whose settings allow `category`, in input order.
pub fn eligible(category: AlertCategory, subscribers: &[Subscriber]) -> Vec<Subscriber> {
    subscribers
        .iter()
        .filter(|s| s.settings.allows(category))
        .cloned()
        .collect()
}

/// Subscribers receiving the end-of-day digest. The digest bypasses category
/// routing: it is gated on the `eod_reports` flag alone.
pub fn eod_recipients(subscribers: &[Subscriber]) -> Vec<Subscriber> {
    subscribers
        .iter()
        .filter(|s| s.settings.eod_reports)
        .cloned()
        .collect()
}
