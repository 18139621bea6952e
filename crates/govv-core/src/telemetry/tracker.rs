//! Periodic driver for a ride session.
//!
//! `RideTracker` owns the session and a single cancellable ticking task.
//! The task is the only writer; readers take snapshots through the same lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::models::{NewActivity, TelemetryPoint};

use super::session::{RideDetails, RideMetrics, RideState, SessionState, SimulationConfig};
use super::TelemetryError;

/// Default sampling period of the simulated GPS.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a running ticker. Dropping it stops the ticks.
#[derive(Debug)]
pub struct TickHandle {
    handle: JoinHandle<()>,
}

impl TickHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Shared<R> {
    session: SessionState,
    rng: R,
}

pub struct RideTracker<R = StdRng> {
    shared: Arc<Mutex<Shared<R>>>,
    period: Duration,
    ticker: Option<TickHandle>,
}

impl RideTracker<StdRng> {
    pub fn new(config: SimulationConfig, period: Duration) -> Self {
        Self::with_rng(config, period, StdRng::from_entropy())
    }
}

impl<R: Rng + Send + 'static> RideTracker<R> {
    /// Create a tracker drawing its jitter from `rng`
    pub fn with_rng(config: SimulationConfig, period: Duration, rng: R) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                session: SessionState::new(config),
                rng,
            })),
            period,
            ticker: None,
        }
    }

    /// Start a new ride. Any running ticker is cancelled first and an
    /// unfinished ride is discarded.
    pub async fn start(&mut self) -> Result<(), TelemetryError> {
        self.cancel_ticker();
        {
            let mut shared = self.shared.lock().await;
            if matches!(shared.session.state(), RideState::Active | RideState::Paused) {
                warn!(samples = shared.session.path().len(), "Discarding unfinished ride");
                shared.session.reset();
            }
            shared.session.start(Utc::now())?;
        }
        self.spawn_ticker();
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), TelemetryError> {
        self.shared.lock().await.session.pause()?;
        self.cancel_ticker();
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<(), TelemetryError> {
        self.shared.lock().await.session.resume()?;
        self.spawn_ticker();
        Ok(())
    }

    pub async fn toggle_pause(&mut self) -> Result<RideState, TelemetryError> {
        let state = self.shared.lock().await.session.state();
        match state {
            RideState::Paused => self.resume().await?,
            _ => self.pause().await?,
        }
        Ok(self.state().await)
    }

    /// Stop ticking and build the ride summary, if the ride is long enough.
    pub async fn stop(&mut self, details: RideDetails) -> Result<Option<NewActivity>, TelemetryError> {
        self.cancel_ticker();
        self.shared.lock().await.session.stop(Utc::now(), details)
    }

    /// Discard the session and return to idle.
    pub async fn reset(&mut self) {
        self.cancel_ticker();
        self.shared.lock().await.session.reset();
    }

    pub async fn state(&self) -> RideState {
        self.shared.lock().await.session.state()
    }

    pub async fn metrics(&self) -> RideMetrics {
        self.shared.lock().await.session.metrics(Utc::now())
    }

    pub async fn path(&self) -> Vec<TelemetryPoint> {
        self.shared.lock().await.session.path().to_vec()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn cancel_ticker(&mut self) {
        if self.ticker.take().is_some() {
            debug!("Ticker cancelled");
        }
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();

        let shared = Arc::clone(&self.shared);
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let mut guard = shared.lock().await;
                let Shared { session, rng } = &mut *guard;
                if session.tick(Utc::now(), rng).is_none() {
                    debug!(state = %session.state(), "Session no longer active, ticker exiting");
                    break;
                }
            }
        });

        self.ticker = Some(TickHandle { handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RideTracker<StdRng> {
        RideTracker::with_rng(SimulationConfig::default(), DEFAULT_TICK_PERIOD, StdRng::seed_from_u64(8))
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        assert!(tracker.is_ticking());

        advance(3_500).await;
        assert_eq!(tracker.path().await.len(), 3);
        assert_eq!(tracker.state().await, RideState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_sampling_until_resume() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        advance(2_500).await;
        tracker.pause().await.unwrap();
        assert!(!tracker.is_ticking());

        let distance = tracker.metrics().await.distance_km;
        advance(5_000).await;
        assert_eq!(tracker.path().await.len(), 2);
        assert_eq!(tracker.metrics().await.distance_km, distance);

        tracker.resume().await.unwrap();
        advance(2_500).await;
        assert_eq!(tracker.path().await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_previous_ticker() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        advance(2_500).await;
        assert_eq!(tracker.path().await.len(), 2);

        tracker.start().await.unwrap();
        assert!(tracker.path().await.is_empty());

        // The old ticker would have fired at 3.0s; only the new one at 3.5s may.
        advance(1_200).await;
        assert_eq!(tracker.path().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_summary() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        advance(4_500).await;

        let summary = tracker.stop(RideDetails::default()).await.unwrap().unwrap();
        assert_eq!(summary.path.len(), 4);
        assert!(!tracker.is_ticking());
        assert_eq!(tracker.state().await, RideState::Stopped);

        advance(3_000).await;
        assert_eq!(tracker.path().await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_too_early_saves_nothing() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        advance(1_500).await;

        assert!(tracker.stop(RideDetails::default()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_idle() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        advance(2_500).await;
        tracker.reset().await;

        assert_eq!(tracker.state().await, RideState::Idle);
        assert!(tracker.path().await.is_empty());
        assert!(!tracker.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_pause() {
        let mut tracker = tracker();
        tracker.start().await.unwrap();
        assert_eq!(tracker.toggle_pause().await.unwrap(), RideState::Paused);
        assert_eq!(tracker.toggle_pause().await.unwrap(), RideState::Active);
        assert!(tracker.is_ticking());
    }

    #[tokio::test]
    async fn test_pause_while_idle_fails() {
        let mut tracker = tracker();
        assert!(tracker.pause().await.is_err());
        assert!(tracker.resume().await.is_err());
    }
}
