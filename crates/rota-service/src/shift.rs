//! Volunteer ledger: sign-ups keyed by occurrence identity.
//!
//! The identity of a recurring occurrence is its anchor instant, never
//! the displayed (possibly moved) start; that is what keeps a sign-up
//! attached when the occurrence is edited.

use rota_core::types::OccurrenceId;
use rota_db::model::shift::{NewShift, Shift};
use rota_db::store::Store;

use crate::error::{ServiceError, ServiceResult};
use crate::resolve;

fn normalized_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "volunteer name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// ## Summary
/// Signs a person up for one occurrence.
///
/// ## Errors
/// `NotFound` if the occurrence does not resolve;
/// `DuplicateVolunteer` if the name is already on it
/// (case-insensitive).
#[tracing::instrument(skip(store))]
pub async fn add_volunteer<S: Store>(
    store: &S,
    target: OccurrenceId,
    name: &str,
) -> ServiceResult<Shift> {
    let person = normalized_name(name)?;
    let resolved = resolve::resolve(store, target).await?;
    let shift = store
        .insert_shift(NewShift {
            calendar_id: resolved.calendar_id(),
            occurrence: target,
            person,
        })
        .await?;
    Ok(shift)
}

/// ## Summary
/// Removes one sign-up from an occurrence.
///
/// ## Errors
/// `NotFound` if the occurrence or the sign-up does not resolve.
#[tracing::instrument(skip(store))]
pub async fn remove_volunteer<S: Store>(
    store: &S,
    target: OccurrenceId,
    shift_id: uuid::Uuid,
) -> ServiceResult<()> {
    resolve::resolve(store, target).await?;
    store.delete_shift(target, shift_id).await?;
    Ok(())
}

/// ## Summary
/// Lists an occurrence's sign-ups in sign-up order.
///
/// ## Errors
/// `NotFound` if the occurrence does not resolve.
#[tracing::instrument(skip(store))]
pub async fn list_volunteers<S: Store>(
    store: &S,
    target: OccurrenceId,
) -> ServiceResult<Vec<Shift>> {
    resolve::resolve(store, target).await?;
    Ok(store.shifts_for(target).await?)
}

/// ## Summary
/// One sign-up batch: optionally adds a person and removes a set of
/// sign-ups in the same write (the shifts-dialog save).
///
/// ## Errors
/// `NotFound` if the occurrence or a removal id does not resolve;
/// `DuplicateVolunteer` if the added name is already on the
/// occurrence.
#[tracing::instrument(skip(store))]
pub async fn update_shifts<S: Store>(
    store: &S,
    target: OccurrenceId,
    new_person: Option<&str>,
    remove: &[uuid::Uuid],
) -> ServiceResult<Vec<Shift>> {
    let resolved = resolve::resolve(store, target).await?;
    let add = match new_person {
        Some(name) => Some(NewShift {
            calendar_id: resolved.calendar_id(),
            occurrence: target,
            person: normalized_name(name)?,
        }),
        None => None,
    };
    Ok(store.update_shifts(target, add, remove).await?)
}
