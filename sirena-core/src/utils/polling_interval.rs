use std::time::Duration;

/// Returns the next alert-source polling interval: slow while the monitored
/// region is alerted, fast otherwise.
pub fn alert_polling_interval(alerted: bool, normal: Duration, backoff: Duration) -> Duration {
    if alerted { backoff } else { normal }
}

/// Returns the cursor an info channel is rewound to when an alert starts.
///
/// `None` (fetch without a lower bound) when the rewind reaches past the
/// representable range.
pub fn rewind_cursor(
    alert_changed_at: time::OffsetDateTime,
    rewind: time::Duration,
) -> Option<time::OffsetDateTime> {
    alert_changed_at.checked_sub(rewind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_backoff_only_while_alerted() {
        let normal = Duration::from_secs(5);
        let backoff = Duration::from_secs(60);
        assert_eq!(alert_polling_interval(false, normal, backoff), normal);
        assert_eq!(alert_polling_interval(true, normal, backoff), backoff);
    }

    #[test]
    fn test_rewind_cursor() {
        assert_eq!(
            rewind_cursor(datetime!(2024-03-01 10:00 UTC), time::Duration::minutes(5)),
            Some(datetime!(2024-03-01 09:55 UTC))
        );
    }

    #[test]
    fn test_rewind_past_representable_range() {
        assert_eq!(
            rewind_cursor(datetime!(2024-03-01 10:00 UTC), time::Duration::MAX),
            None
        );
    }
}
