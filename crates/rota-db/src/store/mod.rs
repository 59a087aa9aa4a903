//! Storage collaborator for the scheduling core.
//!
//! The scheduling layer only ever talks to [`Store`]; the in-memory
//! implementation in [`memory`] is the one the application and the
//! test suites run against. Multi-entity reads are snapshot-consistent
//! and series writes are guarded by an optimistic version counter.

use chrono::{DateTime, TimeDelta, Utc};
use rota_core::types::OccurrenceId;

use crate::error::DbResult;
use crate::model::calendar::{Calendar, NewCalendar};
use crate::model::event::{Event, EventPatch, NewEvent};
use crate::model::overrides::{OccurrenceOverride, OverrideKind};
use crate::model::series::{NewSeries, Series, SeriesPatch};
use crate::model::shift::{NewShift, Shift};

pub mod memory;

pub use memory::MemoryStore;

/// Read-consistent view of everything the materializer needs for one
/// calendar, taken under a single lock guard.
///
/// All collections come back in a fixed order, so any computation over
/// a snapshot is a pure function of persisted state.
#[derive(Debug, Clone)]
pub struct CalendarSnapshot {
    pub calendar: Calendar,
    pub events: Vec<Event>,
    pub series: Vec<Series>,
    pub overrides: Vec<OccurrenceOverride>,
    pub shifts: Vec<Shift>,
}

impl CalendarSnapshot {
    #[must_use]
    pub fn series_by_id(&self, id: uuid::Uuid) -> Option<&Series> {
        self.series.iter().find(|s| s.id == id)
    }

    pub fn overrides_for(&self, series_id: uuid::Uuid) -> impl Iterator<Item = &OccurrenceOverride> {
        self.overrides.iter().filter(move |o| o.series_id == series_id)
    }

    #[must_use]
    pub fn override_at(
        &self,
        series_id: uuid::Uuid,
        anchor: DateTime<Utc>,
    ) -> Option<&OccurrenceOverride> {
        self.overrides
            .iter()
            .find(|o| o.series_id == series_id && o.anchor == anchor)
    }

    /// Sign-ups attached to one occurrence identity, in sign-up order.
    #[must_use]
    pub fn shifts_for(&self, occurrence: OccurrenceId) -> Vec<Shift> {
        self.shifts
            .iter()
            .filter(|s| s.occurrence == occurrence)
            .cloned()
            .collect()
    }
}

/// One "this and following" write, applied atomically by the store.
///
/// The old series is truncated at `anchor`; `successor` is the
/// replacement definition from that point on, or `None` for a tail
/// delete. Overrides and sign-ups at or after `anchor` move to the
/// successor (or are cascaded away when there is none); the entry
/// keyed exactly at `anchor` is re-keyed to the successor's origin so
/// it stays attached when the edit also moved the occurrence.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    pub series_id: uuid::Uuid,
    pub anchor: DateTime<Utc>,
    pub successor: Option<NewSeries>,
}

/// Abstract storage contract for the scheduling engine.
///
/// Every method is one consistent unit of work: implementations must
/// make the compound operations (`apply_split`, `update_series`,
/// `update_shifts`, the cascading deletes) atomic.
#[allow(async_fn_in_trait)]
pub trait Store: Send + Sync {
    async fn insert_calendar(&self, new: NewCalendar) -> DbResult<Calendar>;
    async fn calendar(&self, id: uuid::Uuid) -> DbResult<Option<Calendar>>;

    /// ## Errors
    /// `NotFound` if the calendar does not exist.
    async fn snapshot(&self, calendar_id: uuid::Uuid) -> DbResult<CalendarSnapshot>;

    async fn event(&self, id: uuid::Uuid) -> DbResult<Option<Event>>;
    async fn insert_event(&self, new: NewEvent) -> DbResult<Event>;

    /// ## Errors
    /// `NotFound` if the event does not exist.
    async fn update_event(&self, id: uuid::Uuid, patch: EventPatch) -> DbResult<Event>;

    /// Deletes the event and cascades its sign-ups.
    ///
    /// ## Errors
    /// `NotFound` if the event does not exist.
    async fn delete_event(&self, id: uuid::Uuid) -> DbResult<()>;

    async fn series(&self, id: uuid::Uuid) -> DbResult<Option<Series>>;
    async fn insert_series(&self, new: NewSeries) -> DbResult<Series>;

    /// Updates a series' default fields under the optimistic version
    /// check. `shift_anchors_by` additionally re-keys every override
    /// and sign-up of the series by the given delta, for default-time
    /// edits that move all anchor instants.
    ///
    /// ## Errors
    /// `NotFound` if the series does not exist; `VersionConflict` if
    /// `expected_version` does not match.
    async fn update_series(
        &self,
        id: uuid::Uuid,
        expected_version: i64,
        patch: SeriesPatch,
        shift_anchors_by: Option<TimeDelta>,
    ) -> DbResult<Series>;

    /// Deletes the series and cascades its overrides and sign-ups.
    ///
    /// ## Errors
    /// `NotFound` if the series does not exist.
    async fn delete_series(&self, id: uuid::Uuid) -> DbResult<()>;

    async fn overrides_for(&self, series_id: uuid::Uuid) -> DbResult<Vec<OccurrenceOverride>>;

    /// ## Errors
    /// `NotFound` if the series does not exist.
    async fn upsert_override(
        &self,
        series_id: uuid::Uuid,
        anchor: DateTime<Utc>,
        kind: OverrideKind,
    ) -> DbResult<OccurrenceOverride>;

    /// ## Errors
    /// `NotFound` if no override exists at (`series_id`, `anchor`).
    async fn delete_override(&self, series_id: uuid::Uuid, anchor: DateTime<Utc>) -> DbResult<()>;

    /// Applies a [`SplitPlan`] atomically; returns the created
    /// successor series, if the plan had one.
    ///
    /// ## Errors
    /// `NotFound` if the series does not exist; `VersionConflict` if
    /// `expected_version` does not match the series row.
    async fn apply_split(
        &self,
        plan: SplitPlan,
        expected_version: i64,
    ) -> DbResult<Option<Series>>;

    async fn shifts_for(&self, occurrence: OccurrenceId) -> DbResult<Vec<Shift>>;

    /// ## Errors
    /// `Duplicate` if the person is already signed up for the
    /// occurrence (case-insensitive).
    async fn insert_shift(&self, new: NewShift) -> DbResult<Shift>;

    /// ## Errors
    /// `NotFound` if the sign-up does not exist on that occurrence.
    async fn delete_shift(&self, occurrence: OccurrenceId, shift_id: uuid::Uuid) -> DbResult<()>;

    /// Removes every sign-up of one occurrence; returns how many were
    /// removed.
    async fn delete_shifts_for(&self, occurrence: OccurrenceId) -> DbResult<usize>;

    /// One sign-up batch (one optional addition plus removals) applied
    /// as a single write; returns the occurrence's sign-ups afterwards.
    ///
    /// ## Errors
    /// `Duplicate` if the added person is already signed up;
    /// `NotFound` if a removal id does not exist on that occurrence.
    async fn update_shifts(
        &self,
        occurrence: OccurrenceId,
        add: Option<NewShift>,
        remove: &[uuid::Uuid],
    ) -> DbResult<Vec<Shift>>;
}
