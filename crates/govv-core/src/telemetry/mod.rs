//! Simulated ride telemetry.
//!
//! - `geo`: positions and haversine great-circle distance
//! - `session`: the ride state machine and distance/speed accumulation
//! - `tracker`: a cancellable periodic task driving a session in real time

pub mod geo;
pub mod session;
pub mod tracker;

use thiserror::Error;

pub use geo::{haversine_km, Position, EARTH_RADIUS_KM};
pub use session::{
    average_speed_kmh, RideDetails, RideMetrics, RideState, SessionState, SimulationConfig,
    DEFAULT_MAX_STEP_DEGREES, DEFAULT_ORIGIN,
};
pub use tracker::{RideTracker, TickHandle, DEFAULT_TICK_PERIOD};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Cannot {action} a ride that is {from:?}")]
    InvalidTransition { from: RideState, action: &'static str },
}
