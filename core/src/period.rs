//! Calendar periods used as the reset granularity.
//!
//! A [`Period`] is a `(year, month)` pair. Months are zero-based (`0` is
//! January, `11` is December) because that is how the stored reset fields
//! have always been written.
//!
//! Two readings of the clock belong to the same period exactly when their
//! `(year, month)` pairs are equal. Elapsed time plays no part: the last
//! second of January and the first second of February are different periods.

use crate::environment::Clock;
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when constructing a [`Period`] from out-of-range parts.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid month index {0} (expected 0..=11)")]
pub struct InvalidPeriod(pub u32);

/// A calendar month in a specific year.
///
/// Ordering is chronological: by year, then by month.
///
/// # Examples
///
/// ```
/// use pointkeeper_core::period::Period;
///
/// let december = Period::new(2023, 11).unwrap();
/// let january = Period::new(2024, 0).unwrap();
///
/// assert!(december < january);
/// assert_eq!(december.next(), Some(january));
/// assert_eq!(january.to_string(), "2024-01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period from a year and a zero-based month.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] if `month` is greater than 11.
    pub const fn new(year: i32, month: u32) -> Result<Self, InvalidPeriod> {
        if month > 11 {
            return Err(InvalidPeriod(month));
        }
        Ok(Self { year, month })
    }

    /// The period containing `at`, as seen from the given UTC offset.
    ///
    /// The offset matters only near a month boundary: `2024-01-31T23:30Z` is
    /// still January in UTC but already February at `+01:00`.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = at.with_timezone(&offset);
        Self {
            year: local.year(),
            month: local.month0(),
        }
    }

    /// The period the clock currently reads.
    #[must_use]
    pub fn current<C: Clock + ?Sized>(clock: &C, offset: FixedOffset) -> Self {
        Self::from_datetime(clock.now(), offset)
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Zero-based month (0 = January).
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The following month, rolling over into the next year after December.
    ///
    /// Returns `None` after December of `i32::MAX`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        if self.month < 11 {
            return Some(Self {
                year: self.year,
                month: self.month + 1,
            });
        }
        match self.year.checked_add(1) {
            Some(year) => Some(Self { year, month: 0 }),
            None => None,
        }
    }

    /// Whether stored reset markers name this period.
    ///
    /// Missing markers never match, so a record that was never reset is
    /// always due for one.
    #[must_use]
    pub fn is_recorded_as(self, year: Option<i32>, month: Option<u32>) -> bool {
        year == Some(self.year) && month == Some(self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month + 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_rejects_month_twelve() {
        assert_eq!(Period::new(2024, 12), Err(InvalidPeriod(12)));
        assert!(Period::new(2024, 11).is_ok());
    }

    #[test]
    fn test_from_datetime_is_zero_based() {
        let at = Utc.with_ymd_and_hms(2024, 4, 15, 12, 0, 0).unwrap();
        let period = Period::from_datetime(at, utc());
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 3);
    }

    #[test]
    fn test_offset_moves_boundary_instant() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap();

        let in_utc = Period::from_datetime(at, utc());
        let in_cet = Period::from_datetime(at, FixedOffset::east_opt(3600).unwrap());
        let in_nyc = Period::from_datetime(
            Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap(),
        );

        assert_eq!(in_utc, Period::new(2024, 0).unwrap());
        assert_eq!(in_cet, Period::new(2024, 1).unwrap());
        assert_eq!(in_nyc, Period::new(2024, 1).unwrap());
    }

    #[test]
    fn test_next_rolls_over_year() {
        assert_eq!(
            Period::new(2023, 11).unwrap().next(),
            Period::new(2024, 0).ok()
        );
        assert_eq!(
            Period::new(2024, 5).unwrap().next(),
            Period::new(2024, 6).ok()
        );
    }

    #[test]
    fn test_next_at_end_of_representable_years() {
        assert_eq!(Period::new(i32::MAX, 11).unwrap().next(), None);
        assert_eq!(
            Period::new(i32::MAX, 10).unwrap().next(),
            Period::new(i32::MAX, 11).ok()
        );
        assert_eq!(
            Period::new(i32::MIN, 11).unwrap().next(),
            Period::new(i32::MIN + 1, 0).ok()
        );
    }

    #[test]
    fn test_recorded_markers() {
        let period = Period::new(2024, 0).unwrap();

        assert!(period.is_recorded_as(Some(2024), Some(0)));
        assert!(!period.is_recorded_as(None, None));
        assert!(!period.is_recorded_as(Some(2024), None));
        assert!(!period.is_recorded_as(None, Some(0)));
        // Same month index in another year is a different period
        assert!(!period.is_recorded_as(Some(2023), Some(0)));
        assert!(!period.is_recorded_as(Some(2023), Some(11)));
    }

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(Period::new(2024, 0).unwrap().to_string(), "2024-01");
        assert_eq!(Period::new(987, 11).unwrap().to_string(), "0987-12");
    }

    proptest! {
        #[test]
        fn prop_month_always_in_range(secs in 0i64..4_102_444_800, offset_mins in -1439i32..=1439) {
            let at = Utc.timestamp_opt(secs, 0).unwrap();
            let offset = FixedOffset::east_opt(offset_mins * 60).unwrap();
            let period = Period::from_datetime(at, offset);
            prop_assert!(period.month() <= 11);
        }

        #[test]
        fn prop_next_is_strictly_later(year in -9999i32..9999, month in 0u32..12) {
            let period = Period::new(year, month).unwrap();
            let next = period.next().unwrap();
            prop_assert!(next > period);
            prop_assert!(!next.is_recorded_as(Some(period.year()), Some(period.month())));
        }
    }
}
