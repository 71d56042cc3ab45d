//! Geodesy helpers
//!
//! Distances are returned in miles, the unit the highway speed table uses.
//! [`distance_miles`] solves Vincenty's inverse problem on the WGS-84
//! ellipsoid and falls back to the spherical great circle for the nearly
//! antipodal pairs where the iteration does not converge.

use serde::{Deserialize, Serialize};

/// WGS-84 semi-major axis (metres)
const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// Mean earth radius (metres)
const EARTH_RADIUS_M: f64 = 6_371_008.8;
pub const METRES_PER_MILE: f64 = 1_609.344;

const VINCENTY_MAX_ITERATIONS: usize = 200;
const VINCENTY_TOLERANCE: f64 = 1e-12;

/// A WGS-84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Ellipsoidal distance in miles
pub fn distance_miles(from: Coord, to: Coord) -> f64 {
    match vincenty_metres(from, to) {
        Some(metres) => metres / METRES_PER_MILE,
        None => {
            tracing::debug!(?from, ?to, "Vincenty did not converge, using great circle");
            haversine_miles(from, to)
        }
    }
}

/// Spherical great-circle distance in miles
pub fn haversine_miles(from: Coord, to: Coord) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (to.lon - from.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c / METRES_PER_MILE
}

fn vincenty_metres(from: Coord, to: Coord) -> Option<f64> {
    let b = (1.0 - WGS84_F) * WGS84_A;

    let l = (to.lon - from.lon).to_radians();
    let u1 = ((1.0 - WGS84_F) * from.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * to.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;

    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut sigma = 0.0;
    let mut cos_sq_alpha = 0.0;
    let mut cos_2sigma_m = 0.0;

    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // coincident points
            return Some(0.0);
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            // equatorial line
            0.0
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let lambda_prev = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));
        if (lambda - lambda_prev).abs() < VINCENTY_TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        return None;
    }

    let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma.powi(2))
                        * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

    Some(b * big_a * (sigma - delta_sigma))
}

/// Arithmetic mean of the coordinates, `None` for an empty input
///
/// Good enough for building footprints; not meant for shapes spanning the
/// antimeridian.
pub fn centroid(coords: &[Coord]) -> Option<Coord> {
    if coords.is_empty() {
        return None;
    }
    let n = coords.len() as f64;
    let (lat, lon) = coords
        .iter()
        .fold((0.0, 0.0), |(lat, lon), c| (lat + c.lat, lon + c.lon));
    Some(Coord::new(lat / n, lon / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_one_degree_of_longitude_on_equator() {
        let d = distance_miles(Coord::new(0.0, 0.0), Coord::new(0.0, 1.0));
        // 111 319.49 m
        assert!((d - 69.171).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_one_degree_of_latitude_from_equator() {
        let d = distance_miles(Coord::new(0.0, 0.0), Coord::new(1.0, 0.0));
        // 110 574.39 m
        assert!((d - 68.708).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_coincident_points() {
        let p = Coord::new(51.5, -0.1);
        assert_eq!(distance_miles(p, p), 0.0);
    }

    #[test]
    fn test_nearly_antipodal_distance_is_finite() {
        let d = distance_miles(Coord::new(0.0, 0.0), Coord::new(0.5, 179.7));
        assert!(d.is_finite());
        assert!(d > 12_000.0 && d < 12_500.0, "got {}", d);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&[
            Coord::new(1.0, 1.0),
            Coord::new(3.0, 1.0),
            Coord::new(3.0, 3.0),
            Coord::new(1.0, 3.0),
        ])
        .unwrap();
        assert_eq!(c, Coord::new(2.0, 2.0));
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_coord_validity() {
        assert!(Coord::new(51.5, -0.1).is_valid());
        assert!(!Coord::new(91.0, 0.0).is_valid());
        assert!(!Coord::new(0.0, f64::NAN).is_valid());
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            lat1 in -80.0f64..80.0, lon1 in -80.0f64..80.0,
            lat2 in -80.0f64..80.0, lon2 in -80.0f64..80.0,
        ) {
            let a = Coord::new(lat1, lon1);
            let b = Coord::new(lat2, lon2);
            let ab = distance_miles(a, b);
            let ba = distance_miles(b, a);
            prop_assert!(ab >= 0.0);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn prop_vincenty_close_to_great_circle(
            lat1 in -60.0f64..60.0, lon1 in -170.0f64..170.0,
            dlat in -1.0f64..1.0, dlon in -1.0f64..1.0,
        ) {
            let a = Coord::new(lat1, lon1);
            let b = Coord::new(lat1 + dlat, lon1 + dlon);
            let v = distance_miles(a, b);
            let h = haversine_miles(a, b);
            // the ellipsoid differs from the sphere by well under 1%
            prop_assert!((v - h).abs() <= h * 0.01 + 1e-9);
        }
    }
}
