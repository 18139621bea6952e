use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::Position;

/// Default display name for rides recorded by the simulator
pub const DEFAULT_RIDE_NAME: &str = "Simulated Ride";

/// Default notes attached to simulated rides
pub const DEFAULT_RIDE_NOTES: &str = "Simulated GPS ride";

/// One recorded position. On the wire this is `{lat, lng, t}` with `t` in
/// fractional epoch seconds.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    #[serde(rename = "t")]
    pub timestamp: f64,
}

impl TelemetryPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Build a sample for `position` recorded at `at`
    pub fn at(position: Position, at: DateTime<Utc>) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            timestamp: at.timestamp_millis() as f64 / 1000.0,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

/// Ride summary submitted to the activity store when a session stops.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: Option<String>,
    pub distance_km: f64,
    pub duration_sec: u64,
    pub avg_kmh: f64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub path: Vec<TelemetryPoint>,
    pub notes: Option<String>,
    #[serde(default)]
    pub private: bool,
}

/// A stored activity as returned by the backend.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub duration_sec: u64,
    #[serde(default)]
    pub avg_kmh: f64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub path: Vec<TelemetryPoint>,
    pub notes: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub points_earned: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Activity {
    /// Name to show in listings
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Ride")
    }
}

/// One page of the activity history, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPage {
    #[serde(default)]
    pub items: Vec<Activity>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

impl ActivityPage {
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_telemetry_point_wire_names() {
        let point = TelemetryPoint::new(37.7749, -122.4194, 1_700_000_000.5);
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["lat"], 37.7749);
        assert_eq!(json["lng"], -122.4194);
        assert_eq!(json["t"], 1_700_000_000.5);
    }

    #[test]
    fn test_telemetry_point_at_uses_fractional_seconds() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        let point = TelemetryPoint::at(Position::new(1.0, 2.0), at);
        assert_eq!(point.timestamp, 1_700_000_000.25);
        assert_eq!(point.position(), Position::new(1.0, 2.0));
    }

    #[test]
    fn test_activity_parses_backend_payload() {
        let json = r#"{
            "id": "4f1c",
            "name": "Simulated Ride",
            "distance_km": 1.25,
            "duration_sec": 300,
            "avg_kmh": 15.0,
            "start_time": "2025-06-01T08:30:00+00:00",
            "path": [{"lat": 37.7749, "lng": -122.4194, "t": 1748766600.0}],
            "notes": "Simulated GPS ride",
            "private": false,
            "points_earned": 29,
            "created_at": "2025-06-01T08:35:00.123456+00:00",
            "updated_at": "2025-06-01T08:35:00.123456+00:00"
        }"#;

        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.id, "4f1c");
        assert_eq!(activity.points_earned, 29);
        assert_eq!(activity.path.len(), 1);
        assert_eq!(activity.start_time, Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_activity_display_name_fallback() {
        let json = r#"{"id": "x", "name": "  ", "start_time": "2025-06-01T08:30:00Z", "notes": null}"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.display_name(), "Ride");
    }

    #[test]
    fn test_new_activity_serializes_iso_start_time() {
        let activity = NewActivity {
            name: Some(DEFAULT_RIDE_NAME.to_string()),
            distance_km: 0.5,
            duration_sec: 120,
            avg_kmh: 15.0,
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap(),
            path: vec![],
            notes: Some(DEFAULT_RIDE_NOTES.to_string()),
            private: false,
        };
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["start_time"], "2025-06-01T08:30:00Z");
        assert_eq!(json["private"], false);
    }

    #[test]
    fn test_activity_page_has_more() {
        let page = ActivityPage {
            items: vec![],
            total: 10,
            limit: 20,
            offset: 0,
        };
        assert!(page.has_more());
        assert!(!ActivityPage::default().has_more());
    }
}
