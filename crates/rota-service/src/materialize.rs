//! Occurrence materializer: turns persisted series, overrides and
//! standalone events into the concrete occurrences of a query window.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rota_core::constants::MAX_SPLIT_CHAIN_DEPTH;
use rota_core::types::{OccurrenceId, Window};
use rota_db::model::event::Event;
use rota_db::model::overrides::{MovedFields, OverrideKind};
use rota_db::model::series::Series;
use rota_db::model::shift::Shift;
use rota_db::store::{CalendarSnapshot, Store};

use crate::error::ServiceResult;
use crate::recurrence;
use crate::resolve::{self, Resolved};

/// One concrete, displayable occurrence, standalone or derived from a
/// series anchor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub calendar_id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub volunteers: Vec<Shift>,
}

impl Occurrence {
    fn from_event(event: &Event, volunteers: Vec<Shift>) -> Self {
        Self {
            id: OccurrenceId::Event(event.id),
            calendar_id: event.calendar_id,
            title: event.title.clone(),
            description: event.description.clone(),
            start: event.start,
            end: event.end,
            all_day: event.all_day,
            volunteers,
        }
    }

    /// Series defaults with any moved fields layered on top; `start`
    /// defaults to the anchor, `end` to start plus the series duration.
    fn from_anchor(
        series: &Series,
        anchor: DateTime<Utc>,
        moved: Option<&MovedFields>,
        volunteers: Vec<Shift>,
    ) -> Self {
        let start = moved.and_then(|m| m.start).unwrap_or(anchor);
        let end = moved
            .and_then(|m| m.end)
            .unwrap_or(start + series.duration());
        let title = moved
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| series.title.clone());
        let description = moved
            .and_then(|m| m.description.clone())
            .unwrap_or_else(|| series.description.clone());
        Self {
            id: OccurrenceId::anchor(series.id, anchor),
            calendar_id: series.calendar_id,
            title,
            description,
            start,
            end,
            all_day: series.all_day,
            volunteers,
        }
    }
}

/// ## Summary
/// Materializes every occurrence of a calendar overlapping the window,
/// ordered by displayed start (ties broken by identity).
///
/// Reads one storage snapshot, so the output is a pure function of
/// persisted state.
///
/// ## Errors
/// `NotFound` if the calendar does not exist; `InvalidRule` if a
/// stored series definition is invalid.
#[tracing::instrument(skip(store))]
pub async fn materialize<S: Store>(
    store: &S,
    calendar_id: uuid::Uuid,
    window: Window,
) -> ServiceResult<Vec<Occurrence>> {
    let snapshot = store.snapshot(calendar_id).await?;
    materialize_snapshot(&snapshot, window)
}

/// ## Summary
/// Pure materialization over an already-taken snapshot.
///
/// ## Errors
/// `InvalidRule` if a stored series definition is invalid.
pub fn materialize_snapshot(
    snapshot: &CalendarSnapshot,
    window: Window,
) -> ServiceResult<Vec<Occurrence>> {
    let mut occurrences = Vec::new();

    for event in &snapshot.events {
        if window.overlaps(event.start, event.end) {
            let id = OccurrenceId::Event(event.id);
            occurrences.push(Occurrence::from_event(event, snapshot.shifts_for(id)));
        }
    }

    // Chain roots: series nobody points at through a split. Successor
    // links are reached by walking their predecessor, whatever part of
    // the chain the window lands on.
    let successor_ids: HashSet<uuid::Uuid> = snapshot
        .overrides
        .iter()
        .filter_map(|o| match o.kind {
            OverrideKind::SplitPoint { new_series_id } => new_series_id,
            _ => None,
        })
        .collect();

    for series in &snapshot.series {
        if successor_ids.contains(&series.id) {
            continue;
        }
        let mut link = Some(series);
        let mut depth = 0;
        while let Some(current) = link {
            let next_id = expand_link(snapshot, current, window, &mut occurrences)?;
            link = match next_id {
                Some(id) => {
                    let next = snapshot.series_by_id(id);
                    if next.is_none() {
                        tracing::warn!(series_id = %current.id, successor = %id,
                            "split point references a missing series; treating as truncation");
                    }
                    next
                }
                None => None,
            };
            depth += 1;
            if depth >= MAX_SPLIT_CHAIN_DEPTH && link.is_some() {
                tracing::warn!(series_id = %series.id, "split chain exceeds depth ceiling; truncating walk");
                break;
            }
        }
    }

    occurrences.sort_by(|a, b| (a.start, a.id).cmp(&(b.start, b.id)));
    Ok(occurrences)
}

/// Expands one chain link; returns the successor series id if the link
/// ends in a split that has one.
fn expand_link(
    snapshot: &CalendarSnapshot,
    series: &Series,
    window: Window,
    out: &mut Vec<Occurrence>,
) -> ServiceResult<Option<uuid::Uuid>> {
    let split = snapshot
        .overrides_for(series.id)
        .filter(|o| o.is_split())
        .min_by_key(|o| o.anchor);
    let threshold = split.map(|o| o.anchor);

    // One step of slack each side, so occurrences whose displayed
    // interval pokes into the window are generated and then kept or
    // dropped on their real bounds.
    let slack = recurrence::step_slack(series);
    let padded = Window {
        start: window.start - slack,
        end: window.end + slack,
    };

    let mut generated: HashSet<DateTime<Utc>> = HashSet::new();
    for anchor in recurrence::generate(series, padded)? {
        if threshold.is_some_and(|t| anchor >= t) {
            break;
        }
        generated.insert(anchor);

        let moved = match snapshot.override_at(series.id, anchor).map(|o| &o.kind) {
            Some(OverrideKind::Cancelled) => continue,
            Some(OverrideKind::Moved(fields)) => Some(fields),
            Some(OverrideKind::SplitPoint { .. }) | None => None,
        };
        push_if_visible(snapshot, series, anchor, moved, window, out);
    }

    // MOVED overrides can displace an occurrence across the window
    // boundary in either direction; sweep the ones whose anchor fell
    // outside the padded generation range.
    for o in snapshot.overrides_for(series.id) {
        let Some(fields) = o.as_moved() else {
            continue;
        };
        if generated.contains(&o.anchor)
            || threshold.is_some_and(|t| o.anchor >= t)
            || !recurrence::is_anchor(series, o.anchor)
        {
            continue;
        }
        push_if_visible(snapshot, series, o.anchor, Some(fields), window, out);
    }

    Ok(split.and_then(|o| match o.kind {
        OverrideKind::SplitPoint { new_series_id } => new_series_id,
        _ => None,
    }))
}

fn push_if_visible(
    snapshot: &CalendarSnapshot,
    series: &Series,
    anchor: DateTime<Utc>,
    moved: Option<&MovedFields>,
    window: Window,
    out: &mut Vec<Occurrence>,
) {
    let id = OccurrenceId::anchor(series.id, anchor);
    let occurrence = Occurrence::from_anchor(series, anchor, moved, snapshot.shifts_for(id));
    if window.overlaps(occurrence.start, occurrence.end) {
        out.push(occurrence);
    }
}

/// ## Summary
/// Resolves one occurrence identity to its concrete record with
/// volunteers attached (the detail view).
///
/// ## Errors
/// `NotFound` if the identity does not resolve to a live occurrence.
#[tracing::instrument(skip(store))]
pub async fn occurrence<S: Store>(store: &S, target: OccurrenceId) -> ServiceResult<Occurrence> {
    let resolved = resolve::resolve(store, target).await?;
    let volunteers = store.shifts_for(target).await?;
    Ok(match resolved {
        Resolved::Event(event) => Occurrence::from_event(&event, volunteers),
        Resolved::Occurrence {
            series,
            anchor,
            moved,
        } => Occurrence::from_anchor(&series, anchor, moved.as_ref(), volunteers),
    })
}
