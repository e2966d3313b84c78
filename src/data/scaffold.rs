use anyhow::{Result, bail};
use chrono::NaiveDate;

use super::calendar::decimal_year;

/// One calendar day of the daily grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaffoldDay {
    pub date: NaiveDate,
    pub decimal_year: f64,
}

/// Every calendar day from Jan 1 of `start_year` through Dec 31 of
/// `end_year`, in order.
pub fn daily_scaffold(start_year: i32, end_year: i32) -> Result<Vec<ScaffoldDay>> {
    if end_year < start_year {
        bail!("Invalid year range: {start_year}..{end_year}");
    }
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(start_year, 1, 1),
        NaiveDate::from_ymd_opt(end_year, 12, 31),
    ) else {
        bail!("Year range {start_year}..{end_year} is outside the supported calendar");
    };

    Ok(first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| ScaffoldDay {
            date,
            decimal_year: decimal_year(date),
        })
        .collect())
}

/// Smallest positive gap between consecutive decimal years of the grid.
pub fn min_sampling_interval(days: &[ScaffoldDay]) -> Option<f64> {
    days.windows(2)
        .map(|w| w[1].decimal_year - w[0].decimal_year)
        .filter(|gap| *gap > 0.0)
        .min_by(f64::total_cmp)
}

/// Neighbourhood fraction for LOESS: a window of `window_intervals`
/// minimum sampling intervals, relative to the grid's decimal-year extent.
/// Clamped to `(0, 1]`.
pub fn loess_span(days: &[ScaffoldDay], window_intervals: f64) -> Option<f64> {
    let interval = min_sampling_interval(days)?;
    let extent = days.last()?.decimal_year - days.first()?.decimal_year;
    if extent <= 0.0 {
        return None;
    }
    let span = window_intervals * interval / extent;
    (span > 0.0 && span.is_finite()).then(|| span.min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_single_leap_year() {
        let days = daily_scaffold(2020, 2020).unwrap();
        assert_eq!(days.len(), 366);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(days[365].date, NaiveDate::from_ymd_opt(2020, 12, 31).unwrap());
    }

    #[test]
    fn test_multi_year_has_no_gaps_or_duplicates() {
        let days = daily_scaffold(2019, 2021).unwrap();
        assert_eq!(days.len(), 365 + 366 + 365);
        for w in days.windows(2) {
            assert_eq!(w[1].date, w[0].date.succ_opt().unwrap());
            assert!(w[1].decimal_year > w[0].decimal_year);
        }
    }

    #[test]
    fn test_reversed_range_is_an_error() {
        assert!(daily_scaffold(2021, 2020).is_err());
    }

    #[test]
    fn test_min_interval_is_leap_day_length() {
        let days = daily_scaffold(2019, 2020).unwrap();
        assert_abs_diff_eq!(min_sampling_interval(&days).unwrap(), 1.0 / 366.0, epsilon = 1e-9);

        let days = daily_scaffold(2021, 2021).unwrap();
        assert_abs_diff_eq!(min_sampling_interval(&days).unwrap(), 1.0 / 365.0, epsilon = 1e-9);

        assert!(min_sampling_interval(&days[..1]).is_none());
    }

    #[test]
    fn test_loess_span() {
        let days = daily_scaffold(2021, 2021).unwrap();
        // 45 days over a 364-day extent.
        assert_abs_diff_eq!(loess_span(&days, 45.0).unwrap(), 45.0 / 364.0, epsilon = 1e-6);
        assert_eq!(loess_span(&days, 10_000.0).unwrap(), 1.0);
        assert!(loess_span(&days[..1], 45.0).is_none());
    }
}
