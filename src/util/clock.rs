//! Wall-clock helpers.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Current UTC time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Midnight-to-midnight window of the local day containing `now`, expressed in UTC.
///
/// `utc_offset_minutes` is the caller's offset from UTC (e.g. `-300` for UTC-5).
/// The window is half-open: `start <= t < end`.
pub fn day_window(now: DateTime<Utc>, utc_offset_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = Duration::minutes(i64::from(utc_offset_minutes));
    let local = now.naive_utc() + offset;
    let local_midnight = local.date().and_time(NaiveTime::MIN);
    let start = Utc.from_utc_datetime(&(local_midnight - offset));
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let (start, end) = day_window(now, 0);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_negative_offset_rolls_back_a_day() {
        // 02:00 UTC is still the previous evening in UTC-5.
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 2, 0, 0).unwrap();
        let (start, end) = day_window(now, -300);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 9, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }

    #[test]
    fn test_positive_offset() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        let (start, _) = day_window(now, 120);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap());
    }
}
