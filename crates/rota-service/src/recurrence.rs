//! Temporal rule engine: expands a series definition into the lazy,
//! finite sequence of anchor instants inside a query window.
//!
//! All arithmetic is in UTC; the calendar's timezone is a display
//! concern. An anchor is reachable from the origin by whole steps of
//! the series' frequency, so the sequence is a pure, restartable
//! function of the series row and the window.

use chrono::{DateTime, Datelike, Months, TimeDelta, Utc};
use rota_core::types::{Frequency, Window};
use rota_db::model::series::Series;

use crate::error::{ServiceError, ServiceResult};

/// ## Summary
/// Validates recurrence parameters.
///
/// ## Errors
/// `InvalidRule` if a recurring frequency carries a zero interval.
pub fn validate_rule(frequency: Frequency, interval: u32) -> ServiceResult<()> {
    if frequency.is_recurring() && interval == 0 {
        return Err(ServiceError::InvalidRule(format!(
            "{frequency} series must have a positive interval"
        )));
    }
    Ok(())
}

/// ## Summary
/// Validates an occurrence's start/end pair.
///
/// All-day events may collapse to a single date; timed events need a
/// positive duration.
///
/// ## Errors
/// `InvalidRule` if the pair is inverted (or empty, for timed events).
pub fn validate_times(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    all_day: bool,
) -> ServiceResult<()> {
    if all_day {
        if end < start {
            return Err(ServiceError::InvalidRule(format!(
                "all-day end {end} must not precede start {start}"
            )));
        }
    } else if end <= start {
        return Err(ServiceError::InvalidRule(format!(
            "end {end} must be after start {start}"
        )));
    }
    Ok(())
}

/// ## Summary
/// Validates a full series definition.
///
/// ## Errors
/// `InvalidRule` on a zero interval or an inverted origin interval.
pub fn validate_series(series: &Series) -> ServiceResult<()> {
    validate_rule(series.frequency, series.interval)?;
    validate_times(series.origin_start, series.origin_end, series.all_day)
}

/// Calendar-month stepping with the documented clamp policy: a target
/// month shorter than the origin's day-of-month clamps to its last day
/// (Jan 31 + 1 month = Feb 28/29, Feb 29 + 12 months = Feb 28).
/// Callers always step from the origin, never from a previous clamped
/// anchor, so the day-of-month is not lost in long months.
#[must_use]
pub fn advance_months(origin: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    origin.checked_add_months(Months::new(months))
}

/// The `n`-th anchor predicted by the raw rule, counting the origin as
/// `n = 0`. `None` past the end of a non-recurring series or on
/// datetime overflow.
#[must_use]
pub fn anchor_at(series: &Series, n: i64) -> Option<DateTime<Utc>> {
    if n < 0 {
        return None;
    }
    let interval = i64::from(series.interval);
    match series.frequency {
        Frequency::None => (n == 0).then_some(series.origin_start),
        Frequency::Daily => series
            .origin_start
            .checked_add_signed(TimeDelta::days(n.checked_mul(interval)?)),
        Frequency::Weekly => series
            .origin_start
            .checked_add_signed(TimeDelta::days(n.checked_mul(interval.checked_mul(7)?)?)),
        Frequency::Monthly => {
            let months = u32::try_from(n.checked_mul(interval)?).ok()?;
            advance_months(series.origin_start, months)
        }
        Frequency::Yearly => {
            let months = u32::try_from(n.checked_mul(interval.checked_mul(12)?)?).ok()?;
            advance_months(series.origin_start, months)
        }
    }
}

/// Upper bound on the length of one recurrence step, used by callers
/// that widen a window so occurrences spilling over its edges are
/// still admitted.
#[must_use]
pub fn step_slack(series: &Series) -> TimeDelta {
    let interval = i64::from(series.interval.max(1));
    match series.frequency {
        Frequency::None => series.duration().max(TimeDelta::zero()),
        Frequency::Daily => TimeDelta::days(interval),
        Frequency::Weekly => TimeDelta::days(7 * interval),
        Frequency::Monthly => TimeDelta::days(31 * interval),
        Frequency::Yearly => TimeDelta::days(366 * interval),
    }
}

/// Smallest `n` whose anchor is not before `lower`.
fn first_index(series: &Series, lower: DateTime<Utc>) -> i64 {
    if series.origin_start >= lower {
        return 0;
    }
    let interval = i64::from(series.interval.max(1));
    let estimate = match series.frequency {
        Frequency::None => return 0,
        Frequency::Daily | Frequency::Weekly => {
            let step_days = if series.frequency == Frequency::Weekly {
                7 * interval
            } else {
                interval
            };
            let step_secs = step_days * 86_400;
            // origin_start < lower here, so the delta is positive and
            // plain ceiling division is safe.
            let delta = (lower - series.origin_start).num_seconds();
            (delta + step_secs - 1) / step_secs
        }
        Frequency::Monthly | Frequency::Yearly => {
            let per_step = if series.frequency == Frequency::Yearly {
                12 * interval
            } else {
                interval
            };
            let months = months_between(series.origin_start, lower);
            // Clamping makes the estimate approximate; back off one
            // step and walk forward.
            (months / per_step).saturating_sub(1)
        }
    };
    let mut n = estimate.max(0);
    // The estimate may overshoot by one step on exact multiples, or
    // undershoot for clamped month arithmetic.
    while n > 0 && anchor_at(series, n - 1).is_some_and(|t| t >= lower) {
        n -= 1;
    }
    while anchor_at(series, n).is_some_and(|t| t < lower) {
        n += 1;
    }
    n
}

fn months_between(origin: DateTime<Utc>, t: DateTime<Utc>) -> i64 {
    let origin_months = i64::from(origin.year()) * 12 + i64::from(origin.month0());
    let t_months = i64::from(t.year()) * 12 + i64::from(t.month0());
    t_months - origin_months
}

/// Finite, restartable iterator over a series' anchors within one
/// window (inclusive on both bounds).
#[derive(Debug, Clone)]
pub struct Anchors<'a> {
    series: &'a Series,
    index: i64,
    upper: DateTime<Utc>,
    done: bool,
}

impl Iterator for Anchors<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(anchor) = anchor_at(self.series, self.index) else {
            self.done = true;
            return None;
        };
        if anchor > self.upper {
            self.done = true;
            return None;
        }
        self.index += 1;
        Some(anchor)
    }
}

/// ## Summary
/// Expands a series into every anchor instant within `[window.start,
/// window.end]`. Callers that need edge slack (the materializer) widen
/// the window with [`step_slack`] first.
///
/// ## Errors
/// `InvalidRule` if the series definition is invalid.
pub fn generate(series: &Series, window: Window) -> ServiceResult<Anchors<'_>> {
    validate_series(series)?;
    Ok(Anchors {
        series,
        index: first_index(series, window.start),
        upper: window.end,
        done: false,
    })
}

/// Whether `t` is an instant the raw rule predicts for this series.
#[must_use]
pub fn is_anchor(series: &Series, t: DateTime<Utc>) -> bool {
    if t < series.origin_start || (series.frequency.is_recurring() && series.interval == 0) {
        return false;
    }
    let interval = i64::from(series.interval);
    match series.frequency {
        Frequency::None => t == series.origin_start,
        Frequency::Daily | Frequency::Weekly => {
            let step_days = if series.frequency == Frequency::Weekly {
                7 * interval
            } else {
                interval
            };
            let delta = (t - series.origin_start).num_seconds();
            delta % (step_days * 86_400) == 0
        }
        Frequency::Monthly | Frequency::Yearly => {
            let per_step = if series.frequency == Frequency::Yearly {
                12 * interval
            } else {
                interval
            };
            let months = months_between(series.origin_start, t);
            months % per_step == 0 && anchor_at(series, months / per_step) == Some(t)
        }
    }
}
