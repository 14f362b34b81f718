//! Geographic points and distance.
//!
//! Distances are great-circle distances computed with the haversine formula
//! on a spherical Earth, which is accurate to well under one percent at city
//! scale and is only ever used to rank candidates against each other.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters (IUGG).
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Errors raised for coordinates outside the valid range.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
	#[error("Latitude {0} is outside [-90, 90]")]
	InvalidLatitude(f64),
	#[error("Longitude {0} is outside [-180, 180]")]
	InvalidLongitude(f64),
}

/// A point on the Earth's surface, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}

impl GeoPoint {
	pub const fn new(lat: f64, lng: f64) -> Self {
		Self { lat, lng }
	}

	/// Checks that both coordinates are finite and within range.
	pub fn validate(&self) -> Result<(), GeoError> {
		if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
			return Err(GeoError::InvalidLatitude(self.lat));
		}
		if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
			return Err(GeoError::InvalidLongitude(self.lng));
		}
		Ok(())
	}

	/// Great-circle distance to `other` in meters.
	pub fn distance_to(&self, other: &GeoPoint) -> f64 {
		let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
		let d_lat = (other.lat - self.lat).to_radians();
		let d_lng = (other.lng - self.lng).to_radians();

		let a = (d_lat / 2.0).sin().powi(2)
			+ lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
		// Clamp guards against a > 1.0 from rounding on antipodal points.
		2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_distance_to_self_is_zero() {
		let p = GeoPoint::new(40.748817, -73.985428);
		assert_eq!(p.distance_to(&p), 0.0);
	}

	#[test]
	fn test_city_block_distance() {
		let empire_state = GeoPoint::new(40.748817, -73.985428);
		let times_square = GeoPoint::new(40.758, -73.9855);
		let d = empire_state.distance_to(&times_square);
		assert!((1000.0..1050.0).contains(&d), "got {d}");
	}

	#[test]
	fn test_distance_is_symmetric() {
		let london = GeoPoint::new(51.5074, -0.1278);
		let paris = GeoPoint::new(48.8566, 2.3522);
		let there = london.distance_to(&paris);
		let back = paris.distance_to(&london);
		assert!((there - back).abs() < 1e-6);
		assert!((340_000.0..347_000.0).contains(&there), "got {there}");
	}

	#[test]
	fn test_validate_rejects_out_of_range() {
		assert!(GeoPoint::new(90.0, 180.0).validate().is_ok());
		assert_eq!(
			GeoPoint::new(91.0, 0.0).validate(),
			Err(GeoError::InvalidLatitude(91.0))
		);
		assert_eq!(
			GeoPoint::new(0.0, -180.5).validate(),
			Err(GeoError::InvalidLongitude(-180.5))
		);
		assert!(GeoPoint::new(f64::NAN, 0.0).validate().is_err());
	}
}
