//! JSON shapes written to stdout.

use serde::Serialize;
use strata_pip::{BoundingBox, Coordinates, FeatureId, FeatureRecord, Layer, LookupResult};

#[derive(Debug, Serialize)]
pub struct Feature<'a> {
	pub id: &'a FeatureId,
	pub name: &'a str,
	pub layer: Layer,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub abbreviation: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub centroid: Option<Coordinates>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bbox: Option<BoundingBox>,
}

impl<'a> From<&'a FeatureRecord> for Feature<'a> {
	fn from(record: &'a FeatureRecord) -> Self {
		Self {
			id: &record.id,
			name: &record.metadata.name,
			layer: record.metadata.placetype,
			abbreviation: record.metadata.abbreviation.as_deref(),
			centroid: record.metadata.centroid,
			bbox: record.metadata.bbox,
		}
	}
}

/// One lookup answer. Exactly one of `results` and `error` is present.
#[derive(Debug, Serialize)]
pub struct Answer<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub line: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lat: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lon: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub results: Option<Vec<Feature<'a>>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl<'a> Answer<'a> {
	pub fn lookup(line: Option<usize>, point: Coordinates, result: &'a LookupResult) -> Self {
		let (results, error) = match result {
			Ok(chain) => (Some(chain.iter().map(|r| Feature::from(r.as_ref())).collect()), None),
			Err(err) => (None, Some(err.to_string())),
		};
		Self {
			line,
			lat: Some(point.lat),
			lon: Some(point.lon),
			results,
			error,
		}
	}

	pub fn rejected(line: usize, error: impl ToString) -> Self {
		Self {
			line: Some(line),
			lat: None,
			lon: None,
			results: None,
			error: Some(error.to_string()),
		}
	}
}
