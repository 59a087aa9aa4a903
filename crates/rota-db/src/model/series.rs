use chrono::{DateTime, TimeDelta, Utc};
use rota_core::types::Frequency;
use serde::{Deserialize, Serialize};

/// A recurrence definition plus its default event fields.
///
/// A series is immutable after creation except through the mutation
/// planner: `version` is the optimistic-concurrency counter guarding
/// split and default-field writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: uuid::Uuid,
    pub calendar_id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub origin_start: DateTime<Utc>,
    pub origin_end: DateTime<Utc>,
    pub all_day: bool,
    pub frequency: Frequency,
    /// Steps of `frequency` between occurrences; ignored for
    /// `Frequency::None`.
    pub interval: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    /// Default length of one occurrence.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.origin_end - self.origin_start
    }
}

/// Insert struct for creating new series
#[derive(Debug, Clone)]
pub struct NewSeries {
    pub calendar_id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub origin_start: DateTime<Utc>,
    pub origin_end: DateTime<Utc>,
    pub all_day: bool,
    pub frequency: Frequency,
    pub interval: u32,
}

/// Field-wise update of a series' defaults; `None` leaves the field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct SeriesPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub origin_start: Option<DateTime<Utc>>,
    pub origin_end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
}

impl Series {
    /// Applies a defaults patch in place; the store owns `version` and
    /// `updated_at` bumps.
    pub fn apply_patch(&mut self, patch: &SeriesPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(origin_start) = patch.origin_start {
            self.origin_start = origin_start;
        }
        if let Some(origin_end) = patch.origin_end {
            self.origin_end = origin_end;
        }
        if let Some(all_day) = patch.all_day {
            self.all_day = all_day;
        }
        if let Some(frequency) = patch.frequency {
            self.frequency = frequency;
        }
        if let Some(interval) = patch.interval {
            self.interval = interval;
        }
    }
}
