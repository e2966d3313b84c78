use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Decimal year
// ---------------------------------------------------------------------------

/// Number of days in the calendar year of `year`.
pub fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// Express a date as `year + (day_of_year - 1) / days_in_year`.
///
/// Jan 1 maps exactly onto the integer year; Dec 31 sits one day short of
/// the next year.
pub fn decimal_year(date: NaiveDate) -> f64 {
    let year = date.year();
    year as f64 + date.ordinal0() as f64 / days_in_year(year) as f64
}

// ---------------------------------------------------------------------------
// Week numbering
// ---------------------------------------------------------------------------

/// How a date is assigned to a week of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekNumbering {
    /// ISO-8601 week (1–53); late-December days may fall in week 1.
    #[default]
    Iso,
    /// Consecutive 7-day blocks starting Jan 1 (1–53).
    DayOfYear,
}

impl WeekNumbering {
    pub const ALL: [WeekNumbering; 2] = [WeekNumbering::Iso, WeekNumbering::DayOfYear];

    /// Week number of `date`, always in 1..=53.
    pub fn week(self, date: NaiveDate) -> u32 {
        match self {
            WeekNumbering::Iso => date.iso_week().week(),
            WeekNumbering::DayOfYear => date.ordinal0() / 7 + 1,
        }
    }

    /// The year a week number belongs to (ISO weeks may belong to the
    /// neighbouring year).
    pub fn week_year(self, date: NaiveDate) -> i32 {
        match self {
            WeekNumbering::Iso => date.iso_week().year(),
            WeekNumbering::DayOfYear => date.year(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeekNumbering::Iso => "ISO week",
            WeekNumbering::DayOfYear => "Day-of-year week",
        }
    }
}

// ---------------------------------------------------------------------------
// Day-month-year parsing
// ---------------------------------------------------------------------------

const DMY_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d %b %Y", "%d %B %Y", "%d-%b-%Y"];

const DMY_TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", " %H:%M", "T%H:%M:%S"];

/// Parse a day-month-year timestamp such as `05-07-2020`, `5/7/2020` or
/// `05 Jul 2020`. A trailing time of day is accepted and discarded.
pub fn parse_dmy(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for fmt in DMY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }

    for fmt in DMY_FORMATS {
        for suffix in DMY_TIME_SUFFIXES {
            let full = format!("{fmt}{suffix}");
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, &full) {
                return Some(dt.date());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_decimal_year_jan_first_is_integer() {
        assert_eq!(decimal_year(d(2020, 1, 1)), 2020.0);
        assert_eq!(decimal_year(d(2021, 1, 1)), 2021.0);
    }

    #[test]
    fn test_decimal_year_uses_year_length() {
        assert_abs_diff_eq!(decimal_year(d(2020, 12, 31)), 2020.0 + 365.0 / 366.0, epsilon = 1e-12);
        assert_abs_diff_eq!(decimal_year(d(2021, 7, 2)), 2021.0 + 182.0 / 365.0, epsilon = 1e-12);
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(days_in_year(2019), 365);
        assert_eq!(days_in_year(2020), 366);
        assert_eq!(days_in_year(1900), 365);
        assert_eq!(days_in_year(2000), 366);
    }

    #[test]
    fn test_parse_dmy_variants() {
        assert_eq!(parse_dmy("05-07-2020"), Some(d(2020, 7, 5)));
        assert_eq!(parse_dmy("5/7/2020"), Some(d(2020, 7, 5)));
        assert_eq!(parse_dmy("05.07.2020"), Some(d(2020, 7, 5)));
        assert_eq!(parse_dmy("05 Jul 2020"), Some(d(2020, 7, 5)));
        assert_eq!(parse_dmy("5 July 2020"), Some(d(2020, 7, 5)));
        assert_eq!(parse_dmy(" 05-Jul-2020 "), Some(d(2020, 7, 5)));
        assert_eq!(parse_dmy("05-07-2020 10:31:07"), Some(d(2020, 7, 5)));
    }

    #[test]
    fn test_parse_dmy_rejects_garbage() {
        assert_eq!(parse_dmy(""), None);
        assert_eq!(parse_dmy("not a date"), None);
        assert_eq!(parse_dmy("31-02-2020"), None);
    }

    #[test]
    fn test_week_numbering() {
        // 2021-01-01 is a Friday: ISO week 53 of 2020.
        assert_eq!(WeekNumbering::Iso.week(d(2021, 1, 1)), 53);
        assert_eq!(WeekNumbering::Iso.week_year(d(2021, 1, 1)), 2020);
        assert_eq!(WeekNumbering::DayOfYear.week(d(2021, 1, 1)), 1);
        assert_eq!(WeekNumbering::DayOfYear.week(d(2021, 1, 8)), 2);
        assert_eq!(WeekNumbering::DayOfYear.week(d(2020, 12, 31)), 53);
    }
}
