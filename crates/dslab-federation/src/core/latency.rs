//! Geographic latency model.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geographic position of a federation member.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance in kilometers (haversine formula).
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.).sin().powi(2);
        let c = 2. * a.sqrt().atan2((1. - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

impl Display for Coordinates {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Converts the distance between two members into the network delay of a single hop.
///
/// The delay is `distance / propagation_speed * round_trip_factor`, i.e. a round trip amortized into
/// the cost of one hop. Allocation policies add this value once per probed external host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencyModel {
    /// Signal propagation speed in km/s.
    pub propagation_speed: f64,
    pub round_trip_factor: f64,
}

impl LatencyModel {
    pub fn new(propagation_speed: f64, round_trip_factor: f64) -> Self {
        Self {
            propagation_speed,
            round_trip_factor,
        }
    }

    /// Returns delay in seconds between two locations.
    pub fn latency(&self, a: &Coordinates, b: &Coordinates) -> f64 {
        a.distance_to(b) / self.propagation_speed * self.round_trip_factor
    }
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self::new(200_000., 2.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ufrj() -> Coordinates {
        Coordinates::new(-22.862312050419078, -43.22317329523859)
    }

    fn unifesp() -> Coordinates {
        Coordinates::new(-23.598773, -46.643422)
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(ufrj().distance_to(&ufrj()), 0.);
    }

    #[test]
    fn test_distance_is_symmetric() {
        assert_eq!(ufrj().distance_to(&unifesp()), unifesp().distance_to(&ufrj()));
    }

    #[test]
    // Rio de Janeiro and Sao Paulo campuses are roughly 360 km apart.
    fn test_distance_between_campuses() {
        let distance = ufrj().distance_to(&unifesp());
        assert!(distance > 340. && distance < 380., "distance = {}", distance);
    }

    #[test]
    // One quarter of the equator.
    fn test_distance_along_equator() {
        let distance = Coordinates::new(0., 0.).distance_to(&Coordinates::new(0., 90.));
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM / 2.;
        assert!((distance - expected).abs() < 1e-6);
    }

    #[test]
    fn test_latency_scales_with_speed_and_factor() {
        let a = Coordinates::new(0., 0.);
        let b = Coordinates::new(0., 90.);
        let distance = a.distance_to(&b);
        let model = LatencyModel::new(100_000., 2.);
        assert!((model.latency(&a, &b) - distance / 50_000.).abs() < 1e-12);
        let one_way = LatencyModel::new(100_000., 1.);
        assert!((one_way.latency(&a, &b) - distance / 100_000.).abs() < 1e-12);
    }
}
