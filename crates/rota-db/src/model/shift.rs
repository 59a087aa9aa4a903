use chrono::{DateTime, Utc};
use rota_core::types::OccurrenceId;
use serde::{Deserialize, Serialize};

/// One volunteer sign-up for one concrete occurrence.
///
/// Keys on [`OccurrenceId`], so a sign-up on a recurring occurrence
/// follows the anchor instant, not the displayed start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: uuid::Uuid,
    pub calendar_id: uuid::Uuid,
    pub occurrence: OccurrenceId,
    pub person: String,
    pub created_at: DateTime<Utc>,
}

/// Insert struct for creating new sign-ups
#[derive(Debug, Clone)]
pub struct NewShift {
    pub calendar_id: uuid::Uuid,
    pub occurrence: OccurrenceId,
    pub person: String,
}
