//! Mutation planner: turns "this / this and following / all" edit and
//! delete requests into override-store and series writes.

use chrono::{DateTime, TimeDelta, Utc};
use rota_core::types::{EditScope, Frequency, OccurrenceId};
use rota_db::model::event::{EventPatch, NewEvent};
use rota_db::model::overrides::{MovedFields, OverrideKind};
use rota_db::model::series::{NewSeries, Series, SeriesPatch};
use rota_db::store::{SplitPlan, Store};

use crate::error::{ServiceError, ServiceResult};
use crate::materialize::{self, Occurrence};
use crate::recurrence;
use crate::resolve::{self, Resolved};

/// Requested field changes; `None` leaves a field alone. `start` and
/// `end` are the desired displayed times of the occurrence the user is
/// editing.
#[derive(Debug, Clone, Default)]
pub struct OccurrencePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum EditAction {
    Update(OccurrencePatch),
    Delete,
}

#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(Occurrence),
    Deleted,
}

/// ## Summary
/// Validates and stores a new standalone event.
///
/// ## Errors
/// `InvalidRule` if the time interval is invalid.
pub async fn create_event<S: Store>(store: &S, new: NewEvent) -> ServiceResult<Occurrence> {
    recurrence::validate_times(new.start, new.end, new.all_day)?;
    let event = store.insert_event(new).await?;
    materialize::occurrence(store, OccurrenceId::Event(event.id)).await
}

/// ## Summary
/// Validates and stores a new series; the origin occurrence identity
/// is (`series.id`, `origin_start`).
///
/// ## Errors
/// `InvalidRule` if the recurrence rule or origin interval is invalid.
pub async fn create_series<S: Store>(store: &S, new: NewSeries) -> ServiceResult<Occurrence> {
    recurrence::validate_rule(new.frequency, new.interval)?;
    recurrence::validate_times(new.origin_start, new.origin_end, new.all_day)?;
    let series = store.insert_series(new).await?;
    materialize::occurrence(store, OccurrenceId::anchor(series.id, series.origin_start)).await
}

/// ## Summary
/// Applies one edit or delete request to an occurrence.
///
/// Standalone events take plain field updates whatever the scope.
/// Recurring occurrences route through the override machinery:
/// `This` upserts a moved/cancelled override, `Following` splits the
/// series at the anchor, `All` rewrites the series defaults.
///
/// ## Errors
/// - `NotFound` if the target does not resolve to a live occurrence.
/// - `Conflict` if the series changed concurrently under a
///   `Following`/`All` write.
/// - `InvalidRule` if the requested changes are not a valid rule or
///   time interval.
#[tracing::instrument(skip(store, action))]
pub async fn apply<S: Store>(
    store: &S,
    target: OccurrenceId,
    scope: EditScope,
    action: EditAction,
) -> ServiceResult<EditOutcome> {
    match resolve::resolve(store, target).await? {
        Resolved::Event(event) => apply_event(store, &event, action).await,
        Resolved::Occurrence {
            series,
            anchor,
            moved,
        } => match scope {
            EditScope::This => apply_this(store, &series, anchor, moved, action).await,
            EditScope::Following => apply_following(store, &series, anchor, action).await,
            EditScope::All => apply_all(store, &series, anchor, action).await,
        },
    }
}

async fn apply_event<S: Store>(
    store: &S,
    event: &rota_db::model::event::Event,
    action: EditAction,
) -> ServiceResult<EditOutcome> {
    match action {
        EditAction::Delete => {
            store.delete_event(event.id).await?;
            Ok(EditOutcome::Deleted)
        }
        EditAction::Update(patch) => {
            let start = patch.start.unwrap_or(event.start);
            let end = patch.end.unwrap_or(event.end);
            let all_day = patch.all_day.unwrap_or(event.all_day);
            recurrence::validate_times(start, end, all_day)?;
            let updated = store
                .update_event(
                    event.id,
                    EventPatch {
                        title: patch.title,
                        description: patch.description,
                        start: patch.start,
                        end: patch.end,
                        all_day: patch.all_day,
                    },
                )
                .await?;
            materialize::occurrence(store, OccurrenceId::Event(updated.id)).await
                .map(EditOutcome::Updated)
        }
    }
}

async fn apply_this<S: Store>(
    store: &S,
    series: &Series,
    anchor: DateTime<Utc>,
    previous: Option<MovedFields>,
    action: EditAction,
) -> ServiceResult<EditOutcome> {
    let target = OccurrenceId::anchor(series.id, anchor);
    match action {
        EditAction::Delete => {
            store
                .upsert_override(series.id, anchor, OverrideKind::Cancelled)
                .await?;
            store.delete_shifts_for(target).await?;
            Ok(EditOutcome::Deleted)
        }
        EditAction::Update(patch) => {
            if patch.frequency.is_some() || patch.interval.is_some() || patch.all_day.is_some() {
                return Err(ServiceError::ValidationError(
                    "recurrence and all-day changes apply to the series, not a single occurrence"
                        .to_string(),
                ));
            }
            let previous = previous.unwrap_or_default();
            let merged = MovedFields {
                start: patch.start.or(previous.start),
                end: patch.end.or(previous.end),
                title: patch.title.or(previous.title),
                description: patch.description.or(previous.description),
            };
            let start = merged.start.unwrap_or(anchor);
            let end = merged.end.unwrap_or(start + series.duration());
            recurrence::validate_times(start, end, series.all_day)?;

            store
                .upsert_override(series.id, anchor, OverrideKind::Moved(merged))
                .await?;
            materialize::occurrence(store, target).await.map(EditOutcome::Updated)
        }
    }
}

async fn apply_following<S: Store>(
    store: &S,
    series: &Series,
    anchor: DateTime<Utc>,
    action: EditAction,
) -> ServiceResult<EditOutcome> {
    match action {
        EditAction::Delete => {
            store
                .apply_split(
                    SplitPlan {
                        series_id: series.id,
                        anchor,
                        successor: None,
                    },
                    series.version,
                )
                .await?;
            Ok(EditOutcome::Deleted)
        }
        EditAction::Update(patch) => {
            let origin_start = patch.start.unwrap_or(anchor);
            let origin_end = patch
                .end
                .unwrap_or(origin_start + series.duration());
            let all_day = patch.all_day.unwrap_or(series.all_day);
            let frequency = patch.frequency.unwrap_or(series.frequency);
            let interval = patch.interval.unwrap_or(series.interval);
            recurrence::validate_rule(frequency, interval)?;
            recurrence::validate_times(origin_start, origin_end, all_day)?;

            // The split occurrence is re-keyed onto the successor's
            // origin. Landing it on a later instant that already
            // carries an override or sign-ups would merge two
            // occurrences' rows, so refuse before anything is written.
            if origin_start > anchor {
                let occupied = store
                    .overrides_for(series.id)
                    .await?
                    .iter()
                    .any(|o| o.anchor == origin_start)
                    || !store
                        .shifts_for(OccurrenceId::anchor(series.id, origin_start))
                        .await?
                        .is_empty();
                if occupied {
                    return Err(ServiceError::Conflict(format!(
                        "an occurrence at {origin_start} already has changes or sign-ups"
                    )));
                }
            }

            let successor = store
                .apply_split(
                    SplitPlan {
                        series_id: series.id,
                        anchor,
                        successor: Some(NewSeries {
                            calendar_id: series.calendar_id,
                            title: patch.title.unwrap_or_else(|| series.title.clone()),
                            description: patch
                                .description
                                .unwrap_or_else(|| series.description.clone()),
                            origin_start,
                            origin_end,
                            all_day,
                            frequency,
                            interval,
                        }),
                    },
                    series.version,
                )
                .await?
                .ok_or(ServiceError::InvariantViolation(
                    "split with a successor definition produced no series",
                ))?;

            materialize::occurrence(
                store,
                OccurrenceId::anchor(successor.id, successor.origin_start),
            )
            .await
            .map(EditOutcome::Updated)
        }
    }
}

async fn apply_all<S: Store>(
    store: &S,
    series: &Series,
    anchor: DateTime<Utc>,
    action: EditAction,
) -> ServiceResult<EditOutcome> {
    match action {
        EditAction::Delete => {
            store.delete_series(series.id).await?;
            Ok(EditOutcome::Deleted)
        }
        EditAction::Update(patch) => {
            // Time edits on "all" shift the whole anchor grid by the
            // clock offset the user applied to the presented occurrence.
            let effective_start = patch.start.unwrap_or(anchor);
            let effective_end = patch
                .end
                .unwrap_or(effective_start + series.duration());
            let delta = effective_start - anchor;
            let duration = effective_end - effective_start;
            let all_day = patch.all_day.unwrap_or(series.all_day);
            let frequency = patch.frequency.unwrap_or(series.frequency);
            let interval = patch.interval.unwrap_or(series.interval);
            recurrence::validate_rule(frequency, interval)?;

            let origin_start = series.origin_start + delta;
            let origin_end = origin_start + duration;
            recurrence::validate_times(origin_start, origin_end, all_day)?;

            let shift_anchors_by = (delta != TimeDelta::zero()).then_some(delta);
            store
                .update_series(
                    series.id,
                    series.version,
                    SeriesPatch {
                        title: patch.title,
                        description: patch.description,
                        origin_start: Some(origin_start),
                        origin_end: Some(origin_end),
                        all_day: patch.all_day,
                        frequency: patch.frequency,
                        interval: patch.interval,
                    },
                    shift_anchors_by,
                )
                .await?;

            materialize::occurrence(store, OccurrenceId::anchor(series.id, anchor + delta))
                .await
                .map(EditOutcome::Updated)
        }
    }
}
