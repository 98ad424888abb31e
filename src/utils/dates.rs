use chrono::{DateTime, Utc};

/// Whole calendar days from `from` to `to`, comparing dates only.
///
/// Time of day is dropped on both sides, so an instant late on the expiry
/// day and one just after midnight count as the same day.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.date_naive()
        .signed_duration_since(from.date_naive())
        .num_days()
}

pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_days_between_ignores_time_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2024, 3, 8, 23, 59, 0).unwrap();
        assert_eq!(days_between(now, expiry), 7);

        let late_now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 55, 0).unwrap();
        let early_expiry = Utc.with_ymd_and_hms(2024, 3, 8, 0, 1, 0).unwrap();
        assert_eq!(days_between(late_now, early_expiry), 7);
    }

    #[test]
    fn test_days_between_is_negative_after_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2024, 3, 8, 18, 0, 0).unwrap();
        assert_eq!(days_between(now, expiry), -1);
    }

    #[test]
    fn test_same_calendar_day() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 1).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert!(same_calendar_day(morning, night));
        assert!(!same_calendar_day(night, next));
    }
}
