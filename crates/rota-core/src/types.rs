//! Shared domain vocabulary used by the storage and scheduling layers.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Recurrence cadence of a series.
///
/// `None` series have exactly one occurrence (the origin) and behave as
/// plain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Whether the series repeats at all.
    #[must_use]
    pub const fn is_recurring(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far an edit or delete of a recurring occurrence reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
    /// Only the targeted occurrence.
    This,
    /// The targeted occurrence and every later one in the series.
    Following,
    /// The whole series.
    All,
}

/// Identity of one concrete occurrence.
///
/// Standalone events own their id directly; a recurring occurrence is
/// identified by its series and the *anchor* instant predicted by raw
/// rule expansion, never by the possibly-overridden displayed start.
/// Per-occurrence data (overrides, volunteer sign-ups) keys on this,
/// which is what keeps it attached across moves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceId {
    Event(uuid::Uuid),
    Anchor {
        series_id: uuid::Uuid,
        anchor: DateTime<Utc>,
    },
}

impl OccurrenceId {
    #[must_use]
    pub const fn anchor(series_id: uuid::Uuid, anchor: DateTime<Utc>) -> Self {
        Self::Anchor { series_id, anchor }
    }
}

/// Half-open-agnostic query window; both bounds are inclusive for anchor
/// generation, overlap checks use displayed start/end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// ## Summary
    /// Builds a query window.
    ///
    /// ## Errors
    /// Returns a validation error if `end` is not after `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if end <= start {
            return Err(CoreError::ValidationError(format!(
                "window end {end} must be after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether the interval `[start, end]` overlaps this window,
    /// inclusive at both edges: touching a bound counts.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}

/// Per-calendar display settings, threaded explicitly to display
/// collaborators instead of living in process-global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarSettings {
    /// First day of the week (0 = Sunday, 1 = Monday).
    pub first_day: u8,
    pub next_day_threshold: NaiveTime,
    pub scroll_time: NaiveTime,
    pub slot_min_time: NaiveTime,
    pub slot_max_time: NaiveTime,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            first_day: 1,
            next_day_threshold: NaiveTime::default(),
            scroll_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            slot_min_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            slot_max_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
        }
    }
}
