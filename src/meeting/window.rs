use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar-date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The window covering `days` days back from `end`, or `None` when the
    /// start would fall outside the representable calendar.
    pub fn ending(end: NaiveDate, days: u32) -> Option<Self> {
        let start = end.checked_sub_signed(Duration::days(i64::from(days)))?;
        Some(Self { start, end })
    }

    /// The window of the same length ending the day before this one starts.
    pub fn preceding(&self) -> Option<Self> {
        let end = self.start.checked_sub_signed(Duration::days(1))?;
        let days = u32::try_from(self.days()).ok()?;
        Self::ending(end, days)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%d %b"),
            self.end.format("%d %b %Y")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_ending() {
        let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let window = DateWindow::ending(end, 7).unwrap();

        assert_eq!(window.start, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(window.days(), 7);
        assert!(window.contains(window.start));
        assert!(window.contains(end));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()));
    }

    #[test]
    fn test_window_display() {
        let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            DateWindow::ending(end, 7).unwrap().to_string(),
            "28 Feb - 07 Mar 2025"
        );
    }

    #[test]
    fn test_window_start_out_of_range_is_none() {
        assert_eq!(DateWindow::ending(NaiveDate::MIN, 7), None);
        assert_eq!(DateWindow::ending(NaiveDate::MIN, 1), None);
        assert!(DateWindow::ending(NaiveDate::MIN, 0).is_some());
    }

    #[test]
    fn test_preceding_window() {
        let end = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let previous = DateWindow::ending(end, 7).unwrap().preceding().unwrap();

        assert_eq!(previous.end, NaiveDate::from_ymd_opt(2025, 3, 6).unwrap());
        assert_eq!(previous.start, NaiveDate::from_ymd_opt(2025, 2, 27).unwrap());
        assert_eq!(previous.days(), 7);
    }
}
