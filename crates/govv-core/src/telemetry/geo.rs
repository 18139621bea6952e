use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Return this position moved by the given offsets in degrees
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.latitude + d_lat, self.longitude + d_lng)
    }
}

/// Great-circle distance between two positions in kilometres (haversine).
pub fn haversine_km(from: Position, to: Position) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAN_FRANCISCO: Position = Position::new(37.7749, -122.4194);

    #[test]
    fn test_haversine_fixture() {
        let other = Position::new(37.7849, -122.4294);
        let d = haversine_km(SAN_FRANCISCO, other);
        assert!((d - 1.41733).abs() < 1e-4, "got {d}");
    }

    #[test]
    fn test_haversine_one_degree_on_equator() {
        let d = haversine_km(Position::new(0.0, 0.0), Position::new(0.0, 1.0));
        assert!((d - 111.19493).abs() < 1e-4, "got {d}");
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let pairs = [
            (SAN_FRANCISCO, Position::new(37.7849, -122.4294)),
            (Position::new(51.5007, -0.1246), Position::new(40.6892, -74.0445)),
            (Position::new(-33.8688, 151.2093), Position::new(35.6762, 139.6503)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_km(a, b), haversine_km(b, a));
        }
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert_eq!(haversine_km(SAN_FRANCISCO, SAN_FRANCISCO), 0.0);
    }

    #[test]
    fn test_position_offset() {
        let moved = SAN_FRANCISCO.offset(0.0001, -0.0001);
        assert!((moved.latitude - 37.775).abs() < 1e-12);
        assert!((moved.longitude + 122.4195).abs() < 1e-12);
    }
}
