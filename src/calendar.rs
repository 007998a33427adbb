//! Small calendar helpers shared by the queries, the insights, and the UI.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::error::StoreError;

/// Weeks start on Monday unless a caller asks otherwise.
pub const DEFAULT_FIRST_WEEKDAY: Weekday = Weekday::Mon;

/// The most recent `first_day` on or before `date`.
pub fn week_start(date: NaiveDate, first_day: Weekday) -> NaiveDate {
    let offset = (7 + date.weekday().num_days_from_monday() - first_day.num_days_from_monday()) % 7;
    date - Days::new(u64::from(offset))
}

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), StoreError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| StoreError::Invalid(format!("{year}-{month:02} is not a valid month")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| StoreError::Invalid(format!("{year}-{month:02} is out of range")))?;
    Ok((first, last))
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, StoreError> {
    month_bounds(year, month).map(|(_, last)| last.day())
}

/// Move `(year, month)` by `delta` months, rolling the year as needed.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Grid column of the first day of a month when rows start at `first_day`.
pub fn start_offset(first_of_month: NaiveDate, first_day: Weekday) -> u32 {
    (7 + first_of_month.weekday().num_days_from_monday() - first_day.num_days_from_monday()) % 7
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_start_is_previous_or_same_day() {
        // 2024-05-15 is a Wednesday.
        assert_eq!(week_start(date(2024, 5, 15), Weekday::Mon), date(2024, 5, 13));
        assert_eq!(week_start(date(2024, 5, 13), Weekday::Mon), date(2024, 5, 13));
        assert_eq!(week_start(date(2024, 5, 15), Weekday::Sun), date(2024, 5, 12));
    }

    #[test]
    fn month_bounds_handle_leap_years() {
        assert_eq!(
            month_bounds(2024, 2).unwrap(),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert_eq!(days_in_month(2023, 2).unwrap(), 28);
        assert_eq!(days_in_month(2023, 12).unwrap(), 31);
        assert!(month_bounds(2023, 13).is_err());
    }

    #[test]
    fn shift_month_rolls_years() {
        assert_eq!(shift_month(2024, 1, -1), (2023, 12));
        assert_eq!(shift_month(2024, 12, 1), (2025, 1));
        assert_eq!(shift_month(2024, 6, 0), (2024, 6));
        assert_eq!(shift_month(2024, 3, -15), (2022, 12));
    }

    #[test]
    fn start_offset_counts_from_first_weekday() {
        // 2024-09-01 is a Sunday.
        assert_eq!(start_offset(date(2024, 9, 1), Weekday::Mon), 6);
        assert_eq!(start_offset(date(2024, 9, 1), Weekday::Sun), 0);
    }
}
