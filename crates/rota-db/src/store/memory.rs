//! In-memory [`Store`] implementation.
//!
//! A single `RwLock` over all tables: every mutation runs under the
//! write guard, so compound writes are atomic and concurrent split
//! attempts serialize; `snapshot` clones under the read guard, so
//! reads never observe a half-applied write.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use rota_core::types::OccurrenceId;
use tokio::sync::RwLock;

use crate::error::{DbError, DbResult};
use crate::model::calendar::{Calendar, NewCalendar};
use crate::model::event::{Event, EventPatch, NewEvent};
use crate::model::overrides::{OccurrenceOverride, OverrideKind};
use crate::model::series::{NewSeries, Series, SeriesPatch};
use crate::model::shift::{NewShift, Shift};

use super::{CalendarSnapshot, SplitPlan, Store};

#[derive(Debug, Default)]
struct Tables {
    calendars: HashMap<uuid::Uuid, Calendar>,
    events: HashMap<uuid::Uuid, Event>,
    series: HashMap<uuid::Uuid, Series>,
    overrides: HashMap<(uuid::Uuid, DateTime<Utc>), OccurrenceOverride>,
    shifts: HashMap<uuid::Uuid, Shift>,
}

impl Tables {
    fn series_row(&self, id: uuid::Uuid) -> DbResult<&Series> {
        self.series
            .get(&id)
            .ok_or_else(|| DbError::NotFound(format!("series {id}")))
    }

    fn check_version(series: &Series, expected: i64) -> DbResult<()> {
        if series.version == expected {
            Ok(())
        } else {
            Err(DbError::VersionConflict {
                series_id: series.id,
                expected,
                actual: series.version,
            })
        }
    }

    fn check_duplicate_shift(&self, new: &NewShift) -> DbResult<()> {
        let name = new.person.to_lowercase();
        let taken = self
            .shifts
            .values()
            .any(|s| s.occurrence == new.occurrence && s.person.to_lowercase() == name);
        if taken {
            return Err(DbError::Duplicate(format!(
                "volunteer '{}' already signed up",
                new.person
            )));
        }
        Ok(())
    }

    fn insert_shift_row(&mut self, new: NewShift) -> DbResult<Shift> {
        self.check_duplicate_shift(&new)?;
        let shift = Shift {
            id: uuid::Uuid::new_v4(),
            calendar_id: new.calendar_id,
            occurrence: new.occurrence,
            person: new.person,
            created_at: Utc::now(),
        };
        self.shifts.insert(shift.id, shift.clone());
        Ok(shift)
    }

    fn insert_series_row(&mut self, new: NewSeries) -> Series {
        let now = Utc::now();
        let series = Series {
            id: uuid::Uuid::new_v4(),
            calendar_id: new.calendar_id,
            title: new.title,
            description: new.description,
            origin_start: new.origin_start,
            origin_end: new.origin_end,
            all_day: new.all_day,
            frequency: new.frequency,
            interval: new.interval,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.series.insert(series.id, series.clone());
        series
    }

    fn sorted_shifts_for(&self, occurrence: OccurrenceId) -> Vec<Shift> {
        let mut shifts: Vec<Shift> = self
            .shifts
            .values()
            .filter(|s| s.occurrence == occurrence)
            .cloned()
            .collect();
        shifts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        shifts
    }

    /// Moves overrides and sign-ups of `series_id` at `from_anchor` or
    /// later onto `target` (or drops them when there is no target).
    /// The entry keyed exactly at `from_anchor` lands on
    /// `target_origin`, the rest keep their instant.
    fn rekey_tail(
        &mut self,
        series_id: uuid::Uuid,
        from_anchor: DateTime<Utc>,
        target: Option<(uuid::Uuid, DateTime<Utc>)>,
    ) {
        let moved_keys: Vec<(uuid::Uuid, DateTime<Utc>)> = self
            .overrides
            .keys()
            .filter(|(sid, anchor)| *sid == series_id && *anchor >= from_anchor)
            .copied()
            .collect();
        for key in moved_keys {
            let Some(mut row) = self.overrides.remove(&key) else {
                continue;
            };
            if let Some((target_id, target_origin)) = target {
                let anchor = if key.1 == from_anchor { target_origin } else { key.1 };
                row.series_id = target_id;
                row.anchor = anchor;
                self.overrides.insert((target_id, anchor), row);
            }
        }

        let shift_ids: Vec<uuid::Uuid> = self
            .shifts
            .iter()
            .filter(|(_, s)| {
                matches!(s.occurrence, OccurrenceId::Anchor { series_id: sid, anchor }
                    if sid == series_id && anchor >= from_anchor)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in shift_ids {
            match target {
                Some((target_id, target_origin)) => {
                    if let Some(shift) = self.shifts.get_mut(&id)
                        && let OccurrenceId::Anchor { anchor, .. } = shift.occurrence
                    {
                        let anchor = if anchor == from_anchor { target_origin } else { anchor };
                        shift.occurrence = OccurrenceId::anchor(target_id, anchor);
                    }
                }
                None => {
                    self.shifts.remove(&id);
                }
            }
        }
    }

    /// Shifts every override and sign-up anchor of a series by `delta`
    /// (for default-time edits that move the whole anchor grid).
    fn shift_anchors(&mut self, series_id: uuid::Uuid, delta: TimeDelta) {
        let keys: Vec<(uuid::Uuid, DateTime<Utc>)> = self
            .overrides
            .keys()
            .filter(|(sid, _)| *sid == series_id)
            .copied()
            .collect();
        for key in keys {
            if let Some(mut row) = self.overrides.remove(&key) {
                row.anchor = key.1 + delta;
                self.overrides.insert((series_id, row.anchor), row);
            }
        }
        for shift in self.shifts.values_mut() {
            if let OccurrenceId::Anchor { series_id: sid, anchor } = shift.occurrence
                && sid == series_id
            {
                shift.occurrence = OccurrenceId::anchor(sid, anchor + delta);
            }
        }
    }
}

/// The in-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn insert_calendar(&self, new: NewCalendar) -> DbResult<Calendar> {
        let mut tables = self.tables.write().await;
        let calendar = Calendar {
            id: uuid::Uuid::new_v4(),
            name: new.name,
            timezone: new.timezone,
            settings: new.settings,
            created_at: Utc::now(),
        };
        tables.calendars.insert(calendar.id, calendar.clone());
        Ok(calendar)
    }

    async fn calendar(&self, id: uuid::Uuid) -> DbResult<Option<Calendar>> {
        let tables = self.tables.read().await;
        Ok(tables.calendars.get(&id).cloned())
    }

    async fn snapshot(&self, calendar_id: uuid::Uuid) -> DbResult<CalendarSnapshot> {
        let tables = self.tables.read().await;
        let calendar = tables
            .calendars
            .get(&calendar_id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("calendar {calendar_id}")))?;

        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| e.calendar_id == calendar_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.start, a.id).cmp(&(b.start, b.id)));

        let mut series: Vec<Series> = tables
            .series
            .values()
            .filter(|s| s.calendar_id == calendar_id)
            .cloned()
            .collect();
        series.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        let series_ids: Vec<uuid::Uuid> = series.iter().map(|s| s.id).collect();
        let mut overrides: Vec<OccurrenceOverride> = tables
            .overrides
            .values()
            .filter(|o| series_ids.contains(&o.series_id))
            .cloned()
            .collect();
        overrides.sort_by(|a, b| (a.series_id, a.anchor).cmp(&(b.series_id, b.anchor)));

        let mut shifts: Vec<Shift> = tables
            .shifts
            .values()
            .filter(|s| s.calendar_id == calendar_id)
            .cloned()
            .collect();
        shifts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        Ok(CalendarSnapshot {
            calendar,
            events,
            series,
            overrides,
            shifts,
        })
    }

    async fn event(&self, id: uuid::Uuid) -> DbResult<Option<Event>> {
        let tables = self.tables.read().await;
        Ok(tables.events.get(&id).cloned())
    }

    async fn insert_event(&self, new: NewEvent) -> DbResult<Event> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let event = Event {
            id: uuid::Uuid::new_v4(),
            calendar_id: new.calendar_id,
            title: new.title,
            description: new.description,
            start: new.start,
            end: new.end,
            all_day: new.all_day,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: uuid::Uuid, patch: EventPatch) -> DbResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("event {id}")))?;
        event.apply_patch(&patch);
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_event(&self, id: uuid::Uuid) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        if tables.events.remove(&id).is_none() {
            return Err(DbError::NotFound(format!("event {id}")));
        }
        tables
            .shifts
            .retain(|_, s| s.occurrence != OccurrenceId::Event(id));
        Ok(())
    }

    async fn series(&self, id: uuid::Uuid) -> DbResult<Option<Series>> {
        let tables = self.tables.read().await;
        Ok(tables.series.get(&id).cloned())
    }

    async fn insert_series(&self, new: NewSeries) -> DbResult<Series> {
        let mut tables = self.tables.write().await;
        Ok(tables.insert_series_row(new))
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_series(
        &self,
        id: uuid::Uuid,
        expected_version: i64,
        patch: SeriesPatch,
        shift_anchors_by: Option<TimeDelta>,
    ) -> DbResult<Series> {
        let mut tables = self.tables.write().await;
        Tables::check_version(tables.series_row(id)?, expected_version)?;

        if let Some(delta) = shift_anchors_by
            && delta != TimeDelta::zero()
        {
            tables.shift_anchors(id, delta);
        }

        let series = tables
            .series
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("series {id}")))?;
        series.apply_patch(&patch);
        series.version += 1;
        series.updated_at = Utc::now();
        Ok(series.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_series(&self, id: uuid::Uuid) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        if tables.series.remove(&id).is_none() {
            return Err(DbError::NotFound(format!("series {id}")));
        }
        tables.overrides.retain(|(sid, _), _| *sid != id);
        tables.shifts.retain(|_, s| {
            !matches!(s.occurrence, OccurrenceId::Anchor { series_id, .. } if series_id == id)
        });
        Ok(())
    }

    async fn overrides_for(&self, series_id: uuid::Uuid) -> DbResult<Vec<OccurrenceOverride>> {
        let tables = self.tables.read().await;
        let mut overrides: Vec<OccurrenceOverride> = tables
            .overrides
            .values()
            .filter(|o| o.series_id == series_id)
            .cloned()
            .collect();
        overrides.sort_by_key(|o| o.anchor);
        Ok(overrides)
    }

    async fn upsert_override(
        &self,
        series_id: uuid::Uuid,
        anchor: DateTime<Utc>,
        kind: OverrideKind,
    ) -> DbResult<OccurrenceOverride> {
        let mut tables = self.tables.write().await;
        tables.series_row(series_id)?;
        let row = OccurrenceOverride {
            series_id,
            anchor,
            kind,
            updated_at: Utc::now(),
        };
        tables.overrides.insert((series_id, anchor), row.clone());
        Ok(row)
    }

    async fn delete_override(&self, series_id: uuid::Uuid, anchor: DateTime<Utc>) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .overrides
            .remove(&(series_id, anchor))
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("override ({series_id}, {anchor})")))
    }

    #[tracing::instrument(skip(self, plan), fields(series_id = %plan.series_id, anchor = %plan.anchor))]
    async fn apply_split(
        &self,
        plan: SplitPlan,
        expected_version: i64,
    ) -> DbResult<Option<Series>> {
        let mut tables = self.tables.write().await;
        Tables::check_version(tables.series_row(plan.series_id)?, expected_version)?;

        let successor = plan.successor.map(|new| tables.insert_series_row(new));

        tables.rekey_tail(
            plan.series_id,
            plan.anchor,
            successor.as_ref().map(|s| (s.id, s.origin_start)),
        );

        let split = OccurrenceOverride {
            series_id: plan.series_id,
            anchor: plan.anchor,
            kind: OverrideKind::SplitPoint {
                new_series_id: successor.as_ref().map(|s| s.id),
            },
            updated_at: Utc::now(),
        };
        tables
            .overrides
            .insert((plan.series_id, plan.anchor), split);

        let series = tables
            .series
            .get_mut(&plan.series_id)
            .ok_or_else(|| DbError::NotFound(format!("series {}", plan.series_id)))?;
        series.version += 1;
        series.updated_at = Utc::now();

        Ok(successor)
    }

    async fn shifts_for(&self, occurrence: OccurrenceId) -> DbResult<Vec<Shift>> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_shifts_for(occurrence))
    }

    async fn insert_shift(&self, new: NewShift) -> DbResult<Shift> {
        let mut tables = self.tables.write().await;
        tables.insert_shift_row(new)
    }

    async fn delete_shift(&self, occurrence: OccurrenceId, shift_id: uuid::Uuid) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        let matches_row = tables
            .shifts
            .get(&shift_id)
            .is_some_and(|s| s.occurrence == occurrence);
        if !matches_row {
            return Err(DbError::NotFound(format!("shift {shift_id}")));
        }
        tables.shifts.remove(&shift_id);
        Ok(())
    }

    async fn delete_shifts_for(&self, occurrence: OccurrenceId) -> DbResult<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.shifts.len();
        tables.shifts.retain(|_, s| s.occurrence != occurrence);
        Ok(before - tables.shifts.len())
    }

    async fn update_shifts(
        &self,
        occurrence: OccurrenceId,
        add: Option<NewShift>,
        remove: &[uuid::Uuid],
    ) -> DbResult<Vec<Shift>> {
        let mut tables = self.tables.write().await;
        // Validate the whole batch before mutating anything so a
        // rejected save leaves the roster untouched.
        for shift_id in remove {
            let matches_row = tables
                .shifts
                .get(shift_id)
                .is_some_and(|s| s.occurrence == occurrence);
            if !matches_row {
                return Err(DbError::NotFound(format!("shift {shift_id}")));
            }
        }
        if let Some(new) = &add {
            let name = new.person.to_lowercase();
            let taken = tables.shifts.values().any(|s| {
                s.occurrence == occurrence
                    && !remove.contains(&s.id)
                    && s.person.to_lowercase() == name
            });
            if taken {
                return Err(DbError::Duplicate(format!(
                    "volunteer '{}' already signed up",
                    new.person
                )));
            }
        }
        for shift_id in remove {
            tables.shifts.remove(shift_id);
        }
        if let Some(new) = add {
            tables.insert_shift_row(new)?;
        }
        Ok(tables.sorted_shifts_for(occurrence))
    }
}
