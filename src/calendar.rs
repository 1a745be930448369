//! The fixed non-leap calendar every hourly series is laid out on.
use chrono::{Datelike, Duration, NaiveDate, Timelike};

/// Days in each month of a standard year.
pub const DAYS_PER_MONTH: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Number of hourly values in a standard year.
pub const HOURS_PER_YEAR: usize = 8760;

/// Hours in each month of a standard year.
pub fn hours_per_month() -> [usize; 12] {
    let mut hours = [0; 12];
    for (h, d) in hours.iter_mut().zip(DAYS_PER_MONTH.iter()) {
        *h = d * 24;
    }
    hours
}

/// The half-open hour index range covered by `month` (0 based).
pub fn month_range(month: usize) -> std::ops::Range<usize> {
    let hours = hours_per_month();
    let start: usize = hours[..month].iter().sum();
    start..(start + hours[month])
}

/// The 0 based month an hour index falls in. Indices past the end of the year wrap.
pub fn month_of_hour(hour: usize) -> usize {
    let mut hour = hour % HOURS_PER_YEAR;
    for (month, &len) in hours_per_month().iter().enumerate() {
        if hour < len {
            return month;
        }
        hour -= len;
    }
    11
}

/// Expected `(month, day, hour)` in weather record convention (1 based, hour 1-24) for an index.
pub fn expected_stamp(hour: usize) -> (u32, u32, u32) {
    // 2001 is not a leap year, so its hours map one to one onto the 8760 hour table.
    let start = NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let stamp = start + Duration::hours(hour as i64);

    (stamp.month(), stamp.day(), stamp.hour() + 1)
}

/// Count rows whose month/day/hour fields disagree with the standard calendar.
pub fn count_calendar_mismatches<I>(stamps: I) -> usize
where
    I: IntoIterator<Item = (u32, u32, u32)>,
{
    stamps
        .into_iter()
        .enumerate()
        .filter(|&(i, stamp)| stamp != expected_stamp(i))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_cover_the_year() {
        assert_eq!(hours_per_month().iter().sum::<usize>(), HOURS_PER_YEAR);
        assert_eq!(month_range(0), 0..744);
        assert_eq!(month_range(1), 744..1416);
        assert_eq!(month_range(11).end, HOURS_PER_YEAR);
    }

    #[test]
    fn month_lookup() {
        assert_eq!(month_of_hour(0), 0);
        assert_eq!(month_of_hour(743), 0);
        assert_eq!(month_of_hour(744), 1);
        assert_eq!(month_of_hour(HOURS_PER_YEAR - 1), 11);
        assert_eq!(month_of_hour(HOURS_PER_YEAR), 0);
    }

    #[test]
    fn stamps_use_one_based_hours() {
        assert_eq!(expected_stamp(0), (1, 1, 1));
        assert_eq!(expected_stamp(23), (1, 1, 24));
        assert_eq!(expected_stamp(24), (1, 2, 1));
        assert_eq!(expected_stamp(HOURS_PER_YEAR - 1), (12, 31, 24));
    }

    #[test]
    fn mismatches_are_counted() {
        let good: Vec<_> = (0..48).map(expected_stamp).collect();
        assert_eq!(count_calendar_mismatches(good.clone()), 0);

        let mut bad = good;
        bad[5] = (2, 29, 1);
        assert_eq!(count_calendar_mismatches(bad), 1);
    }
}
