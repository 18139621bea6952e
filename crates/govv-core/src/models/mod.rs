//! Data models for Go VV rides.
//!
//! - `TelemetryPoint`: one recorded `{lat, lng, t}` sample
//! - `NewActivity`, `Activity`, `ActivityPage`: the activity store contract
//! - `DashboardStats`: aggregates over recent activities

pub mod activity;
pub mod dashboard;

pub use activity::{
    Activity, ActivityPage, NewActivity, TelemetryPoint, DEFAULT_RIDE_NAME, DEFAULT_RIDE_NOTES,
};
pub use dashboard::{DashboardStats, DASHBOARD_WINDOW};
