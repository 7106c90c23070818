//! Rolling new-case trends and case waves ending at the reference date.

use crate::analyzers::types::{Rate, TrendRow, WaveSummary};
use crate::analyzers::utility::mean;
use crate::table::Series;
use chrono::{Days, NaiveDate};

/// Mean daily `new_cases` over the `window` days ending at `as_of`, and the
/// growth factor against the day exactly `window` days before `as_of`.
///
/// Returns `None` when no day in the window reports `new_cases`, or when
/// `window` is zero.
pub fn trend_for_series(series: &Series<'_>, as_of: NaiveDate, window: u32) -> Option<TrendRow> {
    if window == 0 {
        return None;
    }

    let start = as_of.checked_sub_days(Days::new(u64::from(window - 1)))?;
    let daily: Vec<f64> = series
        .until(as_of)
        .filter(|r| r.date >= start)
        .filter_map(|r| r.new_cases)
        .collect();

    let mean_new_cases = mean(&daily)?;

    let latest_new_cases = series.on(as_of).and_then(|r| r.new_cases);
    let earlier_new_cases = as_of
        .checked_sub_days(Days::new(u64::from(window)))
        .and_then(|day| series.on(day))
        .and_then(|r| r.new_cases);

    Some(TrendRow {
        country: series.country.to_string(),
        mean_new_cases,
        reporting_days: daily.len(),
        latest_new_cases,
        growth_factor: Rate::from_options(latest_new_cases, earlier_new_cases),
    })
}

/// Rolling mean of `new_cases` over the last `window` rows up to `as_of`,
/// counting each row where that mean rises above the previous row's.
///
/// A row's mean needs at least one reported value in its window. Returns
/// `None` when `window` is zero or the series has no rows by `as_of`.
pub fn waves_for_series(
    series: &Series<'_>,
    as_of: NaiveDate,
    window: usize,
) -> Option<WaveSummary> {
    if window == 0 {
        return None;
    }

    let daily: Vec<Option<f64>> = series.until(as_of).map(|r| r.new_cases).collect();
    if daily.is_empty() {
        return None;
    }

    let averages: Vec<Option<f64>> = (0..daily.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let reported: Vec<f64> = daily[start..=i].iter().flatten().copied().collect();
            mean(&reported)
        })
        .collect();

    let rises: Vec<bool> = averages
        .windows(2)
        .map(|pair| matches!(pair, [Some(before), Some(after)] if after > before))
        .collect();

    Some(WaveSummary {
        country: series.country.to_string(),
        waves: rises.iter().filter(|rose| **rose).count(),
        moving_average: averages.last().copied().flatten(),
        rising: rises.last().copied().unwrap_or(false),
    })
}
