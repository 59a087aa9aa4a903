use rota_core::error::CoreError;
use rota_db::error::DbError;
use thiserror::Error;

/// Scheduling layer errors; the variants callers are expected to match
/// on are `NotFound`, `Conflict`, `InvalidRule` and `DuplicateVolunteer`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Duplicate volunteer: {0}")]
    DuplicateVolunteer(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),

    #[error(transparent)]
    CoreError(#[from] CoreError),
}

/// Storage errors map onto the caller-facing taxonomy: a missing row is
/// `NotFound`, a stale series version is `Conflict`, a unique-name hit
/// is `DuplicateVolunteer`.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::NotFound(what),
            DbError::VersionConflict { series_id, expected, actual } => Self::Conflict(format!(
                "series {series_id} changed concurrently (expected version {expected}, found {actual})"
            )),
            DbError::Duplicate(what) => Self::DuplicateVolunteer(what),
            DbError::CoreError(core) => Self::CoreError(core),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_caller_taxonomy() {
        let not_found: ServiceError = DbError::NotFound("series x".into()).into();
        assert!(matches!(not_found, ServiceError::NotFound(_)));

        let conflict: ServiceError = DbError::VersionConflict {
            series_id: uuid::Uuid::nil(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(conflict, ServiceError::Conflict(_)));

        let duplicate: ServiceError = DbError::Duplicate("Alice".into()).into();
        assert!(matches!(duplicate, ServiceError::DuplicateVolunteer(_)));
    }
}
