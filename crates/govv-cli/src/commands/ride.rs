//! `govv ride`: record a simulated ride in real time.

use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info};

use govv_core::api::ActivityClient;
use govv_core::telemetry::{RideDetails, RideMetrics, RideTracker, SimulationConfig, DEFAULT_TICK_PERIOD};
use govv_core::utils::{format_distance, format_duration, format_speed};
use govv_core::Config;

/// How often live metrics are printed
const DISPLAY_PERIOD: Duration = Duration::from_secs(1);

pub struct RideOptions {
    pub seconds: u64,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub private: bool,
    pub save: bool,
    pub seed: Option<u64>,
}

impl RideOptions {
    fn details(&self) -> RideDetails {
        let defaults = RideDetails::default();
        RideDetails {
            name: self.name.clone().or(defaults.name),
            notes: self.notes.clone().or(defaults.notes),
            private: self.private,
        }
    }
}

fn print_metrics(metrics: &RideMetrics) {
    println!(
        "{:>8}  {:>10}  {:>10}  {:>4} samples",
        format_duration(metrics.duration_sec),
        format_distance(metrics.distance_km),
        format_speed(metrics.avg_kmh),
        metrics.samples
    );
}

pub async fn run(config: &Config, options: RideOptions) -> Result<()> {
    let simulation = SimulationConfig::default();
    let mut tracker = match options.seed {
        Some(seed) => RideTracker::with_rng(simulation, DEFAULT_TICK_PERIOD, StdRng::seed_from_u64(seed)),
        None => RideTracker::new(simulation, DEFAULT_TICK_PERIOD),
    };

    tracker.start().await?;
    println!("{} - riding for {}s, Ctrl-C to stop early", tracker.state().await, options.seconds);
    info!(seconds = options.seconds, seed = ?options.seed, "Ride started");

    let finish = sleep_until(Instant::now() + Duration::from_secs(options.seconds));
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(finish, interrupted);

    let mut display = tokio::time::interval_at(Instant::now() + DISPLAY_PERIOD, DISPLAY_PERIOD);
    loop {
        tokio::select! {
            _ = &mut finish => break,
            _ = &mut interrupted => {
                println!("Stopping early");
                break;
            }
            _ = display.tick() => print_metrics(&tracker.metrics().await),
        }
    }

    let Some(activity) = tracker.stop(options.details()).await? else {
        println!("Ride too short to save: fewer than two GPS samples");
        return Ok(());
    };

    println!();
    println!("Distance   {}", format_distance(activity.distance_km));
    println!("Duration   {}", format_duration(activity.duration_sec));
    println!("Avg speed  {}", format_speed(activity.avg_kmh));
    println!("Samples    {}", activity.path.len());

    if !options.save {
        return Ok(());
    }

    let client = ActivityClient::new(config.backend_url())?;
    match client.create_activity(&activity).await {
        Ok(saved) => println!("Saved ride {} (+{} points)", saved.id, saved.points_earned),
        Err(e) => {
            error!(error = %e, "Failed to save ride");
            eprintln!("Could not save ride: {:#}", e);
        }
    }
    Ok(())
}
