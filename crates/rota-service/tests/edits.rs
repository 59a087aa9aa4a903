//! Scoped edits: single occurrences, series tails and whole series.

mod common;

use chrono::{DateTime, TimeDelta, Utc};
use common::{new_event, new_series, store_with_calendar, utc, window};
use rota_core::types::{EditScope, Frequency, OccurrenceId};
use rota_db::error::DbResult;
use rota_db::model::calendar::{Calendar, NewCalendar};
use rota_db::model::event::{Event, EventPatch, NewEvent};
use rota_db::model::overrides::{OccurrenceOverride, OverrideKind};
use rota_db::model::series::{NewSeries, Series, SeriesPatch};
use rota_db::model::shift::{NewShift, Shift};
use rota_db::store::{CalendarSnapshot, MemoryStore, SplitPlan, Store};
use rota_service::edit::{self, EditAction, EditOutcome, OccurrencePatch};
use rota_service::error::ServiceError;
use rota_service::materialize::{materialize, occurrence};
use rota_service::shift;

#[test_log::test(tokio::test)]
async fn test_this_scope_move_keeps_volunteers() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let target = OccurrenceId::anchor(series.id, utc(2024, 1, 4, 9, 0));
    shift::add_volunteer(&store, target, "Alice").await.unwrap();

    let outcome = edit::apply(
        &store,
        target,
        EditScope::This,
        EditAction::Update(OccurrencePatch {
            start: Some(utc(2024, 1, 4, 14, 0)),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();

    let EditOutcome::Updated(updated) = outcome else {
        panic!("expected an updated occurrence");
    };
    assert_eq!(updated.start, utc(2024, 1, 4, 14, 0));
    assert_eq!(updated.id, target);

    // Roster stays attached to the anchor identity.
    let roster = shift::list_volunteers(&store, target).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].person, "Alice");
}

#[test_log::test(tokio::test)]
async fn test_this_scope_second_edit_layers_on_previous() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let target = OccurrenceId::anchor(series.id, utc(2024, 1, 4, 9, 0));

    edit::apply(
        &store,
        target,
        EditScope::This,
        EditAction::Update(OccurrencePatch {
            start: Some(utc(2024, 1, 4, 14, 0)),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();
    edit::apply(
        &store,
        target,
        EditScope::This,
        EditAction::Update(OccurrencePatch {
            title: Some("double watch".into()),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();

    let detail = occurrence(&store, target).await.unwrap();
    assert_eq!(detail.start, utc(2024, 1, 4, 14, 0));
    assert_eq!(detail.title, "double watch");
}

#[test_log::test(tokio::test)]
async fn test_this_scope_rejects_rule_changes() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();

    let err = edit::apply(
        &store,
        OccurrenceId::anchor(series.id, utc(2024, 1, 4, 9, 0)),
        EditScope::This,
        EditAction::Update(OccurrencePatch {
            frequency: Some(Frequency::Weekly),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[test_log::test(tokio::test)]
async fn test_following_rekeys_later_override_and_volunteers() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();

    // A moved occurrence and a volunteer, both past the future split point.
    let late = OccurrenceId::anchor(series.id, utc(2024, 1, 8, 9, 0));
    edit::apply(
        &store,
        late,
        EditScope::This,
        EditAction::Update(OccurrencePatch {
            start: Some(utc(2024, 1, 8, 12, 0)),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();
    shift::add_volunteer(&store, late, "Bob").await.unwrap();

    let outcome = edit::apply(
        &store,
        OccurrenceId::anchor(series.id, utc(2024, 1, 5, 9, 0)),
        EditScope::Following,
        EditAction::Update(OccurrencePatch {
            title: Some("late watch".into()),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();
    let EditOutcome::Updated(head) = outcome else {
        panic!("expected the successor's first occurrence");
    };
    let OccurrenceId::Anchor { series_id: successor_id, .. } = head.id else {
        panic!("expected an anchor identity");
    };
    assert_ne!(successor_id, series.id);

    // The Jan 8 state now lives under the successor, fully intact.
    let rekeyed = OccurrenceId::anchor(successor_id, utc(2024, 1, 8, 9, 0));
    let detail = occurrence(&store, rekeyed).await.unwrap();
    assert_eq!(detail.start, utc(2024, 1, 8, 12, 0));
    assert_eq!(detail.title, "late watch");
    assert_eq!(detail.volunteers.len(), 1);
    assert_eq!(detail.volunteers[0].person, "Bob");

    // The old identity is dead past the split point.
    assert!(matches!(
        occurrence(&store, late).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_following_delete_truncates_series() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();

    let outcome = edit::apply(
        &store,
        OccurrenceId::anchor(series.id, utc(2024, 1, 5, 9, 0)),
        EditScope::Following,
        EditAction::Delete,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, EditOutcome::Deleted));

    let occurrences = materialize(
        &store,
        calendar.id,
        window(utc(2024, 1, 1, 0, 0), utc(2024, 1, 31, 0, 0)),
    )
    .await
    .unwrap();
    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 2, 9, 0),
            utc(2024, 1, 3, 9, 0),
            utc(2024, 1, 4, 9, 0),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_following_move_onto_a_signed_up_anchor_is_rejected() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let jan5 = OccurrenceId::anchor(series.id, utc(2024, 1, 5, 9, 0));
    let jan6 = OccurrenceId::anchor(series.id, utc(2024, 1, 6, 9, 0));
    shift::add_volunteer(&store, jan5, "Alice").await.unwrap();
    shift::add_volunteer(&store, jan6, "Alice").await.unwrap();

    // Moving Jan 5 and everything after it onto Jan 6's exact instant
    // would pile both rosters onto one occurrence.
    let err = edit::apply(
        &store,
        jan5,
        EditScope::Following,
        EditAction::Update(OccurrencePatch {
            start: Some(utc(2024, 1, 6, 9, 0)),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Nothing was written: the series is unsplit and both rosters are
    // still one person each.
    assert_eq!(shift::list_volunteers(&store, jan5).await.unwrap().len(), 1);
    assert_eq!(shift::list_volunteers(&store, jan6).await.unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_following_move_onto_a_cancelled_anchor_is_rejected() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let jan5 = OccurrenceId::anchor(series.id, utc(2024, 1, 5, 9, 0));
    let jan6 = OccurrenceId::anchor(series.id, utc(2024, 1, 6, 9, 0));
    edit::apply(&store, jan6, EditScope::This, EditAction::Delete)
        .await
        .unwrap();

    let err = edit::apply(
        &store,
        jan5,
        EditScope::Following,
        EditAction::Update(OccurrencePatch {
            start: Some(utc(2024, 1, 6, 9, 0)),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The rejected edit left no split behind: Jan 5 still resolves on
    // the original series and Jan 6 is still cancelled.
    assert!(occurrence(&store, jan5).await.is_ok());
    assert!(matches!(
        occurrence(&store, jan6).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_all_scope_time_edit_rekeys_anchors() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let old_target = OccurrenceId::anchor(series.id, utc(2024, 1, 3, 9, 0));
    shift::add_volunteer(&store, old_target, "Alice").await.unwrap();

    // Move everything two hours later from the Jan 3 occurrence.
    edit::apply(
        &store,
        old_target,
        EditScope::All,
        EditAction::Update(OccurrencePatch {
            start: Some(utc(2024, 1, 3, 11, 0)),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();

    let moved = OccurrenceId::anchor(series.id, utc(2024, 1, 3, 11, 0));
    let detail = occurrence(&store, moved).await.unwrap();
    assert_eq!(detail.end - detail.start, TimeDelta::hours(2));
    assert_eq!(detail.volunteers.len(), 1);
    assert_eq!(detail.volunteers[0].person, "Alice");

    let occurrences = materialize(
        &store,
        calendar.id,
        window(utc(2024, 1, 1, 0, 0), utc(2024, 1, 3, 0, 0)),
    )
    .await
    .unwrap();
    assert_eq!(occurrences.len(), 2);
    assert_eq!(occurrences[0].start, utc(2024, 1, 1, 11, 0));
    assert_eq!(occurrences[1].start, utc(2024, 1, 2, 11, 0));
}

#[test_log::test(tokio::test)]
async fn test_all_scope_delete_cascades() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let target = OccurrenceId::anchor(series.id, utc(2024, 1, 3, 9, 0));
    shift::add_volunteer(&store, target, "Alice").await.unwrap();

    edit::apply(&store, target, EditScope::All, EditAction::Delete)
        .await
        .unwrap();

    let occurrences = materialize(
        &store,
        calendar.id,
        window(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0)),
    )
    .await
    .unwrap();
    assert!(occurrences.is_empty());
    assert!(matches!(
        shift::list_volunteers(&store, target).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_edit_rejects_anchor_off_the_rule() {
    let (store, calendar) = store_with_calendar().await;
    let series = store
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Weekly,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();

    let err = edit::apply(
        &store,
        OccurrenceId::anchor(series.id, utc(2024, 1, 3, 9, 0)),
        EditScope::This,
        EditAction::Delete,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[test_log::test(tokio::test)]
async fn test_create_series_rejects_bad_rules() {
    let (store, calendar) = store_with_calendar().await;

    let zero_interval = new_series(
        calendar.id,
        "watch",
        Frequency::Daily,
        0,
        utc(2024, 1, 1, 9, 0),
    );
    let err = edit::create_series(&store, zero_interval).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRule(_)));

    let mut inverted = new_series(
        calendar.id,
        "watch",
        Frequency::Daily,
        1,
        utc(2024, 1, 1, 9, 0),
    );
    inverted.origin_end = utc(2024, 1, 1, 8, 0);
    let err = edit::create_series(&store, inverted).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRule(_)));
}

/// Delegates to a [`MemoryStore`] but bumps the series version right
/// after every series read, like a second editor racing the caller.
struct ContendedStore {
    inner: MemoryStore,
}

impl Store for ContendedStore {
    async fn series(&self, id: uuid::Uuid) -> DbResult<Option<Series>> {
        let row = self.inner.series(id).await?;
        if let Some(series) = &row {
            self.inner
                .update_series(series.id, series.version, SeriesPatch::default(), None)
                .await?;
        }
        Ok(row)
    }

    async fn insert_calendar(&self, new: NewCalendar) -> DbResult<Calendar> {
        self.inner.insert_calendar(new).await
    }

    async fn calendar(&self, id: uuid::Uuid) -> DbResult<Option<Calendar>> {
        self.inner.calendar(id).await
    }

    async fn snapshot(&self, calendar_id: uuid::Uuid) -> DbResult<CalendarSnapshot> {
        self.inner.snapshot(calendar_id).await
    }

    async fn event(&self, id: uuid::Uuid) -> DbResult<Option<Event>> {
        self.inner.event(id).await
    }

    async fn insert_event(&self, new: NewEvent) -> DbResult<Event> {
        self.inner.insert_event(new).await
    }

    async fn update_event(&self, id: uuid::Uuid, patch: EventPatch) -> DbResult<Event> {
        self.inner.update_event(id, patch).await
    }

    async fn delete_event(&self, id: uuid::Uuid) -> DbResult<()> {
        self.inner.delete_event(id).await
    }

    async fn insert_series(&self, new: NewSeries) -> DbResult<Series> {
        self.inner.insert_series(new).await
    }

    async fn update_series(
        &self,
        id: uuid::Uuid,
        expected_version: i64,
        patch: SeriesPatch,
        shift_anchors_by: Option<TimeDelta>,
    ) -> DbResult<Series> {
        self.inner
            .update_series(id, expected_version, patch, shift_anchors_by)
            .await
    }

    async fn delete_series(&self, id: uuid::Uuid) -> DbResult<()> {
        self.inner.delete_series(id).await
    }

    async fn overrides_for(&self, series_id: uuid::Uuid) -> DbResult<Vec<OccurrenceOverride>> {
        self.inner.overrides_for(series_id).await
    }

    async fn upsert_override(
        &self,
        series_id: uuid::Uuid,
        anchor: DateTime<Utc>,
        kind: OverrideKind,
    ) -> DbResult<OccurrenceOverride> {
        self.inner.upsert_override(series_id, anchor, kind).await
    }

    async fn delete_override(&self, series_id: uuid::Uuid, anchor: DateTime<Utc>) -> DbResult<()> {
        self.inner.delete_override(series_id, anchor).await
    }

    async fn apply_split(
        &self,
        plan: SplitPlan,
        expected_version: i64,
    ) -> DbResult<Option<Series>> {
        self.inner.apply_split(plan, expected_version).await
    }

    async fn shifts_for(&self, occurrence: OccurrenceId) -> DbResult<Vec<Shift>> {
        self.inner.shifts_for(occurrence).await
    }

    async fn insert_shift(&self, new: NewShift) -> DbResult<Shift> {
        self.inner.insert_shift(new).await
    }

    async fn delete_shift(&self, occurrence: OccurrenceId, shift_id: uuid::Uuid) -> DbResult<()> {
        self.inner.delete_shift(occurrence, shift_id).await
    }

    async fn delete_shifts_for(&self, occurrence: OccurrenceId) -> DbResult<usize> {
        self.inner.delete_shifts_for(occurrence).await
    }

    async fn update_shifts(
        &self,
        occurrence: OccurrenceId,
        add: Option<NewShift>,
        remove: &[uuid::Uuid],
    ) -> DbResult<Vec<Shift>> {
        self.inner.update_shifts(occurrence, add, remove).await
    }
}

#[test_log::test(tokio::test)]
async fn test_following_edit_on_a_concurrently_changed_series_conflicts() {
    let (inner, calendar) = store_with_calendar().await;
    let series = inner
        .insert_series(new_series(
            calendar.id,
            "watch",
            Frequency::Daily,
            1,
            utc(2024, 1, 1, 9, 0),
        ))
        .await
        .unwrap();
    let store = ContendedStore { inner };

    let err = edit::apply(
        &store,
        OccurrenceId::anchor(series.id, utc(2024, 1, 5, 9, 0)),
        EditScope::Following,
        EditAction::Update(OccurrencePatch {
            title: Some("late watch".into()),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The stale split was not applied.
    let occurrences = materialize(
        &store,
        calendar.id,
        window(utc(2024, 1, 1, 0, 0), utc(2024, 1, 8, 0, 0)),
    )
    .await
    .unwrap();
    assert!(occurrences.iter().all(|o| o.title == "watch"));
}

#[test_log::test(tokio::test)]
async fn test_standalone_event_edit_ignores_scope() {
    let (store, calendar) = store_with_calendar().await;
    let event = store
        .insert_event(new_event(calendar.id, "inventory", utc(2024, 1, 3, 10, 0)))
        .await
        .unwrap();

    let outcome = edit::apply(
        &store,
        OccurrenceId::Event(event.id),
        EditScope::Following,
        EditAction::Update(OccurrencePatch {
            title: Some("stocktake".into()),
            ..OccurrencePatch::default()
        }),
    )
    .await
    .unwrap();
    let EditOutcome::Updated(updated) = outcome else {
        panic!("expected an updated occurrence");
    };
    assert_eq!(updated.title, "stocktake");

    edit::apply(
        &store,
        OccurrenceId::Event(event.id),
        EditScope::All,
        EditAction::Delete,
    )
    .await
    .unwrap();
    assert!(store.event(event.id).await.unwrap().is_none());
}
