// Ride session state machine: Idle -> Active <-> Paused -> Stopped -> Idle.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::models::{NewActivity, TelemetryPoint, DEFAULT_RIDE_NAME, DEFAULT_RIDE_NOTES};

use super::geo::{haversine_km, Position};
use super::TelemetryError;

/// Where simulated rides begin (San Francisco City Hall area).
pub const DEFAULT_ORIGIN: Position = Position::new(37.7749, -122.4194);

/// Largest per-axis move of one simulated tick, in degrees (roughly 10 m).
pub const DEFAULT_MAX_STEP_DEGREES: f64 = 0.0001;

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideState {
    Idle,
    Active,
    Paused,
    Stopped,
}

impl std::fmt::Display for RideState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RideState::Idle => write!(f, "Ready to Ride"),
            RideState::Active => write!(f, "Live Ride"),
            RideState::Paused => write!(f, "Paused"),
            RideState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub origin: Position,
    pub max_step_degrees: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN,
            max_step_degrees: DEFAULT_MAX_STEP_DEGREES,
        }
    }
}

/// Free-form details attached to a ride when it is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct RideDetails {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub private: bool,
}

impl Default for RideDetails {
    fn default() -> Self {
        Self {
            name: Some(DEFAULT_RIDE_NAME.to_string()),
            notes: Some(DEFAULT_RIDE_NOTES.to_string()),
            private: false,
        }
    }
}

/// Live metrics for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RideMetrics {
    pub state: RideState,
    pub distance_km: f64,
    pub duration_sec: u64,
    pub avg_kmh: f64,
    pub samples: usize,
}

/// Average speed in km/h; zero when no time has elapsed.
pub fn average_speed_kmh(distance_km: f64, duration_sec: u64) -> f64 {
    if duration_sec == 0 {
        0.0
    } else {
        distance_km / (duration_sec as f64 / SECONDS_PER_HOUR)
    }
}

/// State of one simulated ride.
///
/// Samples are only appended while `Active`. The duration clock runs from
/// `start` regardless of pauses and freezes at `stop`.
#[derive(Debug, Clone)]
pub struct SessionState {
    config: SimulationConfig,
    state: RideState,
    path: Vec<TelemetryPoint>,
    distance_km: f64,
    avg_kmh: f64,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            state: RideState::Idle,
            path: Vec::new(),
            distance_km: 0.0,
            avg_kmh: 0.0,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn state(&self) -> RideState {
        self.state
    }

    pub fn path(&self) -> &[TelemetryPoint] {
        &self.path
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// Average speed as of the last tick (or stop)
    pub fn average_speed_kmh(&self) -> f64 {
        self.avg_kmh
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Whole seconds elapsed since the session started.
    pub fn duration_sec(&self, now: DateTime<Utc>) -> u64 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let end = self.stopped_at.unwrap_or(now);
        (end - started).num_seconds().max(0) as u64
    }

    pub fn metrics(&self, now: DateTime<Utc>) -> RideMetrics {
        let duration_sec = self.duration_sec(now);
        RideMetrics {
            state: self.state,
            distance_km: self.distance_km,
            duration_sec,
            avg_kmh: average_speed_kmh(self.distance_km, duration_sec),
            samples: self.path.len(),
        }
    }

    /// Begin a new session. A stopped session is cleared first.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TelemetryError> {
        match self.state {
            RideState::Idle | RideState::Stopped => {
                self.clear();
                self.state = RideState::Active;
                self.started_at = Some(now);
                info!(started_at = %now, "Ride started");
                Ok(())
            }
            from => Err(TelemetryError::InvalidTransition { from, action: "start" }),
        }
    }

    pub fn pause(&mut self) -> Result<(), TelemetryError> {
        match self.state {
            RideState::Active => {
                self.state = RideState::Paused;
                debug!(samples = self.path.len(), "Ride paused");
                Ok(())
            }
            from => Err(TelemetryError::InvalidTransition { from, action: "pause" }),
        }
    }

    pub fn resume(&mut self) -> Result<(), TelemetryError> {
        match self.state {
            RideState::Paused => {
                self.state = RideState::Active;
                debug!(samples = self.path.len(), "Ride resumed");
                Ok(())
            }
            from => Err(TelemetryError::InvalidTransition { from, action: "resume" }),
        }
    }

    /// Pause an active ride or resume a paused one.
    pub fn toggle_pause(&mut self) -> Result<RideState, TelemetryError> {
        match self.state {
            RideState::Active => self.pause()?,
            RideState::Paused => self.resume()?,
            from => return Err(TelemetryError::InvalidTransition { from, action: "toggle pause" }),
        }
        Ok(self.state)
    }

    /// Record one simulated GPS sample. Does nothing unless `Active`.
    ///
    /// The first sample is the configured origin and adds no distance; each
    /// later sample jitters the previous one by up to `max_step_degrees` per
    /// axis and adds the haversine distance between the two.
    pub fn tick<R: Rng>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Option<TelemetryPoint> {
        if self.state != RideState::Active {
            return None;
        }

        let next = match self.path.last() {
            None => TelemetryPoint::at(self.config.origin, now),
            Some(last) => {
                let step = self.config.max_step_degrees;
                let d_lat = (rng.gen::<f64>() - 0.5) * 2.0 * step;
                let d_lng = (rng.gen::<f64>() - 0.5) * 2.0 * step;
                let position = last.position().offset(d_lat, d_lng);
                self.distance_km += haversine_km(last.position(), position);
                TelemetryPoint::at(position, now)
            }
        };

        self.path.push(next);
        self.avg_kmh = average_speed_kmh(self.distance_km, self.duration_sec(now));
        Some(next)
    }

    /// Stop the session and build the summary to submit.
    ///
    /// Returns `None` when fewer than two samples were recorded.
    pub fn stop(&mut self, now: DateTime<Utc>, details: RideDetails) -> Result<Option<NewActivity>, TelemetryError> {
        let started_at = match (self.state, self.started_at) {
            (RideState::Active | RideState::Paused, Some(started_at)) => started_at,
            (from, _) => return Err(TelemetryError::InvalidTransition { from, action: "stop" }),
        };

        self.state = RideState::Stopped;
        self.stopped_at = Some(now);
        let duration_sec = self.duration_sec(now);
        self.avg_kmh = average_speed_kmh(self.distance_km, duration_sec);

        if self.path.len() < 2 {
            info!(samples = self.path.len(), "Ride too short to save");
            return Ok(None);
        }

        info!(
            distance_km = self.distance_km,
            duration_sec,
            samples = self.path.len(),
            "Ride stopped"
        );

        Ok(Some(NewActivity {
            name: details.name,
            distance_km: self.distance_km,
            duration_sec,
            avg_kmh: self.avg_kmh,
            start_time: started_at,
            path: self.path.clone(),
            notes: details.notes,
            private: details.private,
        }))
    }

    /// Discard all session data and return to `Idle`.
    pub fn reset(&mut self) {
        self.clear();
        self.state = RideState::Idle;
    }

    fn clear(&mut self) {
        self.path.clear();
        self.distance_km = 0.0;
        self.avg_kmh = 0.0;
        self.started_at = None;
        self.stopped_at = None;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}
