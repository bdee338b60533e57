//! Calendar-month windows for dashboard statistics.
//!
//! All boundaries are UTC midnights; `end` is exclusive.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// One calendar month, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthWindow {
    /// `YYYY-MM`
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn first_of(year: i32, month0: i32) -> Option<DateTime<Utc>> {
    let total = year * 12 + month0;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Midnight on the first day of the month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    first_of(now.year(), now.month0() as i32).unwrap_or(now)
}

/// The last `months` calendar months up to and including the current one,
/// oldest first.
pub fn month_windows(now: DateTime<Utc>, months: u32) -> Vec<MonthWindow> {
    let year = now.year();
    let month0 = now.month0() as i32;

    (0..months as i32)
        .rev()
        .filter_map(|back| {
            let start = first_of(year, month0 - back)?;
            let end = first_of(year, month0 - back + 1)?;
            Some(MonthWindow {
                label: start.format("%Y-%m").to_string(),
                start,
                end,
            })
        })
        .collect()
}
