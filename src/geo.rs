//! Great-circle distance on WGS-84 (spec §4.3, §9).
//!
//! The teacher's source used a planar approximation with a latitude
//! correction factor for its own (price-space) distance metric; the spec
//! mandates real Haversine for geo-impossible-travel, so this is a fresh
//! module rather than an adaptation.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point with known coordinates. Unknown coordinates must not be
/// represented by this type — callers use `Option<Coordinates>` and the
/// caller is responsible for the "unknown, not false" rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Haversine great-circle distance in kilometers.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.min(1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Implied speed in km/h between two observations `seconds_elapsed` apart.
/// Returns `None` if the elapsed time is non-positive (can't imply a speed).
pub fn implied_speed_kmh(a: Coordinates, b: Coordinates, seconds_elapsed: f64) -> Option<f64> {
    if seconds_elapsed <= 0.0 {
        return None;
    }
    let distance = haversine_km(a, b);
    Some(distance / (seconds_elapsed / 3600.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = Coordinates { lat: 6.45, lon: 3.40 };
        assert!(haversine_km(p, p) < 1e-6);
    }

    #[test]
    fn lagos_to_london_is_about_5000km() {
        // S6: Lagos (6.45, 3.40) -> London (51.50, -0.12)
        let lagos = Coordinates { lat: 6.45, lon: 3.40 };
        let london = Coordinates { lat: 51.50, lon: -0.12 };
        let d = haversine_km(lagos, london);
        assert!((4800.0..5200.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn implied_speed_matches_scenario_s6() {
        let lagos = Coordinates { lat: 6.45, lon: 3.40 };
        let london = Coordinates { lat: 51.50, lon: -0.12 };
        let speed = implied_speed_kmh(lagos, london, 30.0 * 60.0).unwrap();
        assert!(speed > 900.0, "speed was {speed}");
    }

    #[test]
    fn non_positive_elapsed_time_is_none() {
        let p = Coordinates { lat: 0.0, lon: 0.0 };
        let q = Coordinates { lat: 1.0, lon: 1.0 };
        assert!(implied_speed_kmh(p, q, 0.0).is_none());
        assert!(implied_speed_kmh(p, q, -10.0).is_none());
    }
}
