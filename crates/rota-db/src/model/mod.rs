pub mod calendar;
pub mod event;
pub mod overrides;
pub mod series;
pub mod shift;
