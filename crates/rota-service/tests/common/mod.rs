//! Shared fixtures for the scheduling integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rota_core::config::CalendarConfig;
use rota_core::types::{CalendarSettings, Frequency, Window};
use rota_db::model::calendar::{Calendar, NewCalendar};
use rota_db::model::event::NewEvent;
use rota_db::model::series::NewSeries;
use rota_db::store::{MemoryStore, Store};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Window {
    Window::new(start, end).unwrap()
}

pub async fn store_with_calendar() -> (MemoryStore, Calendar) {
    let config = CalendarConfig {
        default_timezone: chrono_tz::Tz::UTC,
        display: CalendarSettings::default(),
    };
    let store = MemoryStore::new();
    let calendar = store
        .insert_calendar(NewCalendar::from_config("night watch", &config))
        .await
        .expect("calendar insert");
    (store, calendar)
}

pub fn new_series(
    calendar_id: uuid::Uuid,
    title: &str,
    frequency: Frequency,
    interval: u32,
    start: DateTime<Utc>,
) -> NewSeries {
    NewSeries {
        calendar_id,
        title: title.into(),
        description: String::new(),
        origin_start: start,
        origin_end: start + TimeDelta::hours(2),
        all_day: false,
        frequency,
        interval,
    }
}

pub fn new_event(
    calendar_id: uuid::Uuid,
    title: &str,
    start: DateTime<Utc>,
) -> NewEvent {
    NewEvent {
        calendar_id,
        title: title.into(),
        description: String::new(),
        start,
        end: start + TimeDelta::hours(2),
        all_day: false,
    }
}
