//! Tests for shared types

#[cfg(test)]
mod tests {
    use super::super::types::*;

    #[test]
    fn preference_set_defaults_to_all_on() {
        let settings = PreferenceSet::default();
        assert!(settings.price_alerts);
        assert!(settings.signal_alerts);
        assert!(settings.news_alerts);
        assert!(settings.eod_reports);
    }

    #[test]
    fn preference_set_serde_fills_missing_flags() {
        let settings: PreferenceSet = serde_json::from_str(r#"{"price_alerts": false}"#).unwrap();
        assert!(!settings.price_alerts);
        assert!(settings.signal_alerts);
        assert!(settings.news_alerts);
        assert!(settings.eod_reports);
    }

    #[test]
    fn category_maps_to_matching_flag() {
        let settings = PreferenceSet {
            signal_alerts: false,
            ..Default::default()
        };

        assert!(settings.allows(AlertCategory::Price));
        assert!(!settings.allows(AlertCategory::Signal));
        assert!(settings.allows(AlertCategory::News));
    }

    #[test]
    fn set_and_get_are_symmetric() {
        let mut settings = PreferenceSet::default();
        for kind in [
            PreferenceKind::Price,
            PreferenceKind::Signal,
            PreferenceKind::News,
            PreferenceKind::Eod,
        ] {
            settings.set(kind, false);
            assert!(!settings.get(kind));
            settings.set(kind, true);
            assert!(settings.get(kind));
        }
    }

    #[test]
    fn notification_deserializes_from_producer_payload() {
        let notification: Notification = serde_json::from_str(
            r#"{
                "category": "price",
                "title": "Gold moved 1.2%",
                "body": "XAU/USD crossed 2400",
                "attachment": "/charts/move.png"
            }"#,
        )
        .unwrap();
        assert_eq!(notification.category, AlertCategory::Price);
        assert!(notification.attachment.is_some());

        let bare: Notification = serde_json::from_str(
            r#"{"category": "news", "title": "t", "body": "b"}"#,
        )
        .unwrap();
        assert!(bare.attachment.is_none());
    }
}
