use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted deviation from one rule-predicted anchor of a series.
///
/// Keyed by (`series_id`, `anchor`); the anchor is the *unmodified*
/// predicted instant, which is what keeps the key stable when the
/// displayed start moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceOverride {
    pub series_id: uuid::Uuid,
    pub anchor: DateTime<Utc>,
    pub kind: OverrideKind,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OverrideKind {
    /// The occurrence exists but some fields deviate from the series
    /// defaults.
    Moved(MovedFields),
    /// The occurrence is deleted; the anchor stays reserved so it is
    /// never re-emitted.
    Cancelled,
    /// From this anchor onward the series is replaced by `new_series_id`.
    /// `None` means the tail was deleted outright (a "this and
    /// following" delete) and there is no successor.
    SplitPoint { new_series_id: Option<uuid::Uuid> },
}

/// Deviating fields of a moved occurrence; `None` falls back to the
/// series default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedFields {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl OccurrenceOverride {
    #[must_use]
    pub const fn is_split(&self) -> bool {
        matches!(self.kind, OverrideKind::SplitPoint { .. })
    }

    #[must_use]
    pub const fn as_moved(&self) -> Option<&MovedFields> {
        match &self.kind {
            OverrideKind::Moved(fields) => Some(fields),
            OverrideKind::Cancelled | OverrideKind::SplitPoint { .. } => None,
        }
    }
}
