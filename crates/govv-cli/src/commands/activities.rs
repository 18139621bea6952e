//! `govv history`, `govv show` and `govv dashboard`.

use anyhow::Result;
use chrono::Utc;
use tracing::error;

use govv_core::api::{ActivityClient, ApiError};
use govv_core::models::{DashboardStats, DASHBOARD_WINDOW};
use govv_core::utils::{format_date, format_distance, format_duration, format_speed, sparkline, truncate_string};
use govv_core::Config;

/// Width of the name column in the history table
const NAME_WIDTH: usize = 24;

/// Log and print a backend failure instead of aborting
fn report(action: &str, err: &anyhow::Error) {
    error!(error = %err, "Failed to {}", action);
    eprintln!("Could not {}: {:#}", action, err);
}

pub async fn history(config: &Config, limit: u32, offset: u32) -> Result<()> {
    let client = ActivityClient::new(config.backend_url())?;
    let page = match client.list_activities(limit, offset).await {
        Ok(page) => page,
        Err(e) => {
            report("load ride history", &e);
            return Ok(());
        }
    };

    if page.items.is_empty() {
        println!("No rides yet.");
        return Ok(());
    }

    for activity in &page.items {
        println!(
            "{:<14} {:<width$} {:>10} {:>10} {:>5} min  {:>4} pts  {}",
            format_date(&activity.start_time.to_rfc3339()),
            truncate_string(activity.display_name(), NAME_WIDTH),
            format_distance(activity.distance_km),
            format_speed(activity.avg_kmh),
            (activity.duration_sec as f64 / 60.0).round(),
            activity.points_earned,
            activity.id,
            width = NAME_WIDTH,
        );
    }

    let shown_to = page.offset + page.items.len() as u64;
    println!("{}-{} of {}", page.offset + 1, shown_to, page.total);
    if page.has_more() {
        println!("More: govv history --offset {}", shown_to);
    }
    Ok(())
}

pub async fn show(config: &Config, id: &str) -> Result<()> {
    let client = ActivityClient::new(config.backend_url())?;
    let activity = match client.get_activity(id).await {
        Ok(activity) => activity,
        Err(e) if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_))) => {
            println!("No ride with id {}", id);
            return Ok(());
        }
        Err(e) => {
            report("load ride", &e);
            return Ok(());
        }
    };

    println!("{}", activity.display_name());
    println!("Started    {}", format_date(&activity.start_time.to_rfc3339()));
    println!("Distance   {}", format_distance(activity.distance_km));
    println!("Duration   {}", format_duration(activity.duration_sec));
    println!("Avg speed  {}", format_speed(activity.avg_kmh));
    println!("Points     {}", activity.points_earned);
    println!("Samples    {}", activity.path.len());
    println!("Visibility {}", if activity.private { "private" } else { "public" });
    if let Some(ref notes) = activity.notes {
        println!("Notes      {}", notes);
    }
    Ok(())
}

pub async fn dashboard(config: &Config) -> Result<()> {
    let client = ActivityClient::new(config.backend_url())?;
    let page = match client.list_activities(DASHBOARD_WINDOW as u32, 0).await {
        Ok(page) => page,
        Err(e) => {
            report("load dashboard", &e);
            return Ok(());
        }
    };

    let stats = DashboardStats::from_activities(&page.items, Utc::now().date_naive());
    println!("Total distance  {:.1} km", stats.total_km);
    println!("Rides           {}", stats.rides);
    println!("Points          {}", stats.points);
    println!("Day streak      {}", stats.streak);
    if !stats.speeds.is_empty() {
        // Listing is newest first; chart oldest to newest
        let speeds: Vec<f64> = stats.speeds.iter().rev().copied().collect();
        println!("Speed trend     {}", sparkline(&speeds));
    }
    Ok(())
}
