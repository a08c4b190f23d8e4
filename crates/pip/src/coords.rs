//! WGS84 coordinates and bounding boxes.

use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
	pub lat: f64,
	pub lon: f64,
}

impl Coordinates {
	/// Creates a point, rejecting non-finite or out-of-range values.
	pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
		if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
			return Err(CoordinateError::Latitude(lat));
		}
		if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
			return Err(CoordinateError::Longitude(lon));
		}
		Ok(Self { lat, lon })
	}
}

/// Axis-aligned extent in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
	pub min_lon: f64,
	pub min_lat: f64,
	pub max_lon: f64,
	pub max_lat: f64,
}

impl BoundingBox {
	/// Inclusive containment test.
	pub fn contains(&self, point: Coordinates) -> bool {
		(self.min_lon..=self.max_lon).contains(&point.lon) && (self.min_lat..=self.max_lat).contains(&point.lat)
	}
}
