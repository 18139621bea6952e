use std::collections::HashSet;

use chrono::{Days, NaiveDate};

use super::Activity;

/// Number of recent activities the dashboard aggregates over
pub const DASHBOARD_WINDOW: u64 = 50;

/// Aggregate statistics shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub total_km: f64,
    pub rides: usize,
    pub points: i64,
    /// Consecutive days with a ride, counting back from today
    pub streak: u32,
    /// Average speed of each ride, in listing order
    pub speeds: Vec<f64>,
}

impl DashboardStats {
    pub fn from_activities(activities: &[Activity], today: NaiveDate) -> Self {
        let mut stats = Self {
            rides: activities.len(),
            ..Self::default()
        };

        let mut ride_days = HashSet::new();
        for activity in activities {
            stats.total_km += activity.distance_km;
            stats.points += activity.points_earned;
            stats.speeds.push(activity.avg_kmh);
            ride_days.insert(activity.start_time.date_naive());
        }

        stats.streak = streak_ending(&ride_days, today);
        stats
    }
}

fn streak_ending(ride_days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = Some(today);
    while let Some(d) = day {
        if !ride_days.contains(&d) {
            break;
        }
        streak += 1;
        day = d.checked_sub_days(Days::new(1));
    }
    streak
}
