//! Resolution of an occurrence identity against persisted state,
//! shared by the materializer, the mutation planner and the ledger.

use chrono::{DateTime, Utc};
use rota_core::types::OccurrenceId;
use rota_db::model::event::Event;
use rota_db::model::overrides::{MovedFields, OccurrenceOverride, OverrideKind};
use rota_db::model::series::Series;
use rota_db::store::Store;

use crate::error::{ServiceError, ServiceResult};
use crate::recurrence;

/// A target that resolved to a live occurrence.
#[derive(Debug, Clone)]
pub(crate) enum Resolved {
    Event(Event),
    Occurrence {
        series: Series,
        anchor: DateTime<Utc>,
        moved: Option<MovedFields>,
    },
}

impl Resolved {
    pub(crate) fn calendar_id(&self) -> uuid::Uuid {
        match self {
            Self::Event(event) => event.calendar_id,
            Self::Occurrence { series, .. } => series.calendar_id,
        }
    }
}

/// Earliest split anchor of a series; rule generation is inert from
/// there on.
pub(crate) fn split_threshold(overrides: &[OccurrenceOverride]) -> Option<DateTime<Utc>> {
    overrides
        .iter()
        .filter(|o| o.is_split())
        .map(|o| o.anchor)
        .min()
}

/// ## Summary
/// Resolves an occurrence identity to its live backing rows.
///
/// A recurring target must name a rule-predicted anchor that has not
/// been cancelled and is still on this side of any split point.
///
/// ## Errors
/// `NotFound` if the identity does not resolve.
pub(crate) async fn resolve<S: Store>(store: &S, target: OccurrenceId) -> ServiceResult<Resolved> {
    match target {
        OccurrenceId::Event(id) => {
            let event = store
                .event(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("event {id}")))?;
            Ok(Resolved::Event(event))
        }
        OccurrenceId::Anchor { series_id, anchor } => {
            let series = store
                .series(series_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("series {series_id}")))?;
            let overrides = store.overrides_for(series_id).await?;
            resolve_anchor(series, anchor, &overrides)
        }
    }
}

pub(crate) fn resolve_anchor(
    series: Series,
    anchor: DateTime<Utc>,
    overrides: &[OccurrenceOverride],
) -> ServiceResult<Resolved> {
    if !recurrence::is_anchor(&series, anchor) {
        return Err(ServiceError::NotFound(format!(
            "series {} has no occurrence at {anchor}",
            series.id
        )));
    }
    if split_threshold(overrides).is_some_and(|threshold| anchor >= threshold) {
        // From the threshold on, the occurrence lives under the
        // successor series.
        return Err(ServiceError::NotFound(format!(
            "series {} was split before {anchor}",
            series.id
        )));
    }
    let existing = overrides
        .iter()
        .find(|o| o.anchor == anchor)
        .map(|o| &o.kind);
    let moved = match existing {
        Some(OverrideKind::Cancelled) => {
            return Err(ServiceError::NotFound(format!(
                "occurrence at {anchor} was cancelled"
            )));
        }
        Some(OverrideKind::Moved(fields)) => Some(fields.clone()),
        Some(OverrideKind::SplitPoint { .. }) | None => None,
    };
    Ok(Resolved::Occurrence {
        series,
        anchor,
        moved,
    })
}
