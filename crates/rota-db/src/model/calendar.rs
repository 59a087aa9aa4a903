use rota_core::config::CalendarConfig;
use rota_core::types::CalendarSettings;
use serde::{Deserialize, Serialize};

/// A shared calendar owning events, series and volunteer sign-ups.
///
/// Role and sharing records live with the authorization collaborator,
/// not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: uuid::Uuid,
    pub name: String,
    /// Display timezone; all stored instants are UTC.
    pub timezone: chrono_tz::Tz,
    pub settings: CalendarSettings,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert struct for creating new calendars
#[derive(Debug, Clone)]
pub struct NewCalendar {
    pub name: String,
    pub timezone: chrono_tz::Tz,
    pub settings: CalendarSettings,
}

impl NewCalendar {
    /// Applies the deployment-wide calendar defaults.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &CalendarConfig) -> Self {
        Self {
            name: name.into(),
            timezone: config.default_timezone,
            settings: config.display.clone(),
        }
    }
}
