use thiserror::Error;

/// Storage layer errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Version conflict on series {series_id}: expected {expected}, found {actual}")]
    VersionConflict {
        series_id: uuid::Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Duplicate row: {0}")]
    Duplicate(String),

    #[error(transparent)]
    CoreError(#[from] rota_core::error::CoreError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;
