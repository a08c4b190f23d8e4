//! Who's On First feature decoding.
//!
//! A layer file is a GeoJSON FeatureCollection. Each feature becomes a
//! [`FeatureRecord`]; features with a `Polygon` or `MultiPolygon` geometry are
//! also indexed. Features that are retired are dropped entirely:
//!
//! - `mz:is_current` is `0`
//! - `edtf:deprecated` holds a date
//! - `wof:superseded_by` lists at least one id
//!
//! Hierarchy entries pointing at placeholder ids (`-1` and friends) are dropped.
//!
//! Features are decoded one at a time: a feature whose properties do not fit
//! the expected shapes is counted as skipped and the rest of the layer loads.
//! Explicit `null`s read as absent and coordinates may be numeric strings.

use std::collections::BTreeMap;

use geo::MultiPolygon;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use strata_pip::{AncestorMap, BoundingBox, Coordinates, FeatureId, FeatureMetadata, FeatureRecord, Layer};

use crate::IndexError;
use crate::geometry::{RawGeometry, to_multi_polygon};

/// Decoded contents of one layer file.
#[derive(Debug, Default)]
pub struct WofLayer {
	pub records: Vec<FeatureRecord>,
	pub shapes: Vec<(FeatureId, MultiPolygon<f64>)>,
	/// Features dropped as retired, malformed, or of another placetype.
	pub skipped: usize,
}

#[derive(Deserialize)]
struct Collection {
	#[serde(default)]
	features: Vec<Value>,
}

#[derive(Deserialize)]
struct RawFeature {
	#[serde(default)]
	id: Option<WofId>,
	#[serde(default)]
	properties: Value,
	#[serde(default)]
	geometry: Option<RawGeometry>,
}

/// A JSON number, or a string holding one.
#[derive(Debug, Clone, Copy)]
struct Number(Option<f64>);

impl<'de> Deserialize<'de> for Number {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Float(f64),
			Text(String),
		}
		Ok(Self(match Raw::deserialize(deserializer)? {
			Raw::Float(value) => Some(value),
			Raw::Text(text) => text.trim().parse().ok(),
		}))
	}
}

/// Reads `null` as an empty list.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// WOF ids appear both as integers and as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WofId {
	Int(i64),
	Text(String),
}

impl WofId {
	/// `None` for placeholder ids (negative or empty).
	fn feature_id(&self) -> Option<FeatureId> {
		match self {
			Self::Int(n) if *n >= 0 => Some(FeatureId(n.to_string())),
			Self::Text(s) if !s.trim().is_empty() && !s.trim().starts_with('-') => Some(FeatureId(s.trim().to_string())),
			_ => None,
		}
	}

	fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(n) => Some(*n),
			Self::Text(s) => s.trim().parse().ok(),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBbox {
	Text(String),
	Values(Vec<f64>),
}

impl RawBbox {
	fn to_bbox(&self) -> Option<BoundingBox> {
		let values: Vec<f64> = match self {
			Self::Text(s) => s.split(',').map(|v| v.trim().parse().ok()).collect::<Option<_>>()?,
			Self::Values(v) => v.clone(),
		};
		match values.as_slice() {
			&[min_lon, min_lat, max_lon, max_lat] => Some(BoundingBox {
				min_lon,
				min_lat,
				max_lon,
				max_lat,
			}),
			_ => None,
		}
	}
}

#[derive(Default, Deserialize)]
struct Properties {
	#[serde(rename = "wof:id")]
	id: Option<WofId>,
	#[serde(rename = "wof:name")]
	name: Option<String>,
	#[serde(rename = "wof:placetype")]
	placetype: Option<String>,
	#[serde(rename = "wof:hierarchy", default, deserialize_with = "nullable_vec")]
	hierarchy: Vec<BTreeMap<String, Option<WofId>>>,
	#[serde(rename = "wof:shortcode")]
	shortcode: Option<String>,
	#[serde(rename = "wof:abbreviation")]
	abbreviation: Option<String>,
	#[serde(rename = "geom:latitude")]
	geom_latitude: Option<Number>,
	#[serde(rename = "geom:longitude")]
	geom_longitude: Option<Number>,
	#[serde(rename = "lbl:latitude")]
	label_latitude: Option<Number>,
	#[serde(rename = "lbl:longitude")]
	label_longitude: Option<Number>,
	#[serde(rename = "geom:bbox")]
	bbox: Option<RawBbox>,
	#[serde(rename = "name:eng_x_preferred", default, deserialize_with = "nullable_vec")]
	preferred_english: Vec<String>,
	#[serde(rename = "mz:is_current")]
	is_current: Option<WofId>,
	#[serde(rename = "edtf:deprecated")]
	deprecated: Option<String>,
	#[serde(rename = "wof:superseded_by", default, deserialize_with = "nullable_vec")]
	superseded_by: Vec<WofId>,
}

impl Properties {
	fn is_retired(&self) -> bool {
		let not_current = self.is_current.as_ref().and_then(WofId::as_int) == Some(0);
		let deprecated = self
			.deprecated
			.as_deref()
			.map(str::trim)
			.is_some_and(|d| !d.is_empty() && d != "uuuu");
		not_current || deprecated || !self.superseded_by.is_empty()
	}

	fn centroid(&self) -> Option<Coordinates> {
		let pair = |lat: Option<Number>, lon: Option<Number>| Some((lat?.0?, lon?.0?));
		let (lat, lon) = pair(self.geom_latitude, self.geom_longitude).or_else(|| pair(self.label_latitude, self.label_longitude))?;
		Coordinates::new(lat, lon).ok()
	}

	fn ancestors(&self) -> Vec<AncestorMap> {
		self.hierarchy
			.iter()
			.map(|entry| {
				entry
					.iter()
					.filter_map(|(kind, id)| Some((kind.clone(), id.as_ref()?.feature_id()?)))
					.collect::<AncestorMap>()
			})
			.filter(|map| !map.is_empty())
			.collect()
	}
}

/// Decodes one layer file.
///
/// With `localized_admin_names` set, a feature's first `name:eng_x_preferred`
/// value replaces `wof:name`.
pub fn parse_layer(bytes: &[u8], layer: Layer, localized_admin_names: bool) -> Result<WofLayer, IndexError> {
	let collection: Collection = serde_json::from_slice(bytes)?;
	let mut out = WofLayer::default();

	for raw in collection.features {
		let feature = match RawFeature::deserialize(raw) {
			Ok(feature) => feature,
			Err(err) => {
				out.skipped += 1;
				tracing::warn!(%layer, error = %err, "index.wof.bad_feature");
				continue;
			}
		};
		let properties = match &feature.properties {
			Value::Null => Properties::default(),
			value => match Properties::deserialize(value) {
				Ok(properties) => properties,
				Err(err) => {
					out.skipped += 1;
					let id = feature.id.as_ref().and_then(WofId::feature_id);
					tracing::warn!(%layer, id = ?id, error = %err, "index.wof.bad_properties");
					continue;
				}
			},
		};
		let Some(id) = properties.id.as_ref().or(feature.id.as_ref()).and_then(WofId::feature_id) else {
			out.skipped += 1;
			tracing::debug!(%layer, "index.wof.missing_id");
			continue;
		};
		if properties.is_retired() {
			out.skipped += 1;
			tracing::trace!(%layer, %id, "index.wof.retired");
			continue;
		}
		if let Some(kind) = &properties.placetype
			&& kind.parse::<Layer>().ok() != Some(layer)
		{
			out.skipped += 1;
			tracing::debug!(%layer, %id, placetype = %kind, "index.wof.placetype_mismatch");
			continue;
		}

		let localized = localized_admin_names.then(|| properties.preferred_english.first()).flatten();
		let Some(name) = localized.or(properties.name.as_ref()).cloned() else {
			out.skipped += 1;
			tracing::debug!(%layer, %id, "index.wof.missing_name");
			continue;
		};

		if let Some(geometry) = &feature.geometry {
			match to_multi_polygon(id.as_str(), geometry) {
				Ok(Some(shape)) => out.shapes.push((id.clone(), shape)),
				Ok(None) => tracing::trace!(%layer, %id, kind = %geometry.kind, "index.wof.unindexed_geometry"),
				Err(err) => {
					out.skipped += 1;
					tracing::warn!(%layer, error = %err, "index.wof.bad_geometry");
					continue;
				}
			}
		}

		out.records.push(FeatureRecord {
			hierarchy: properties.ancestors(),
			metadata: FeatureMetadata {
				name,
				placetype: layer,
				abbreviation: properties.shortcode.clone().or_else(|| properties.abbreviation.clone()),
				centroid: properties.centroid(),
				bbox: properties.bbox.as_ref().and_then(RawBbox::to_bbox),
			},
			id,
		});
	}

	Ok(out)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::{Value, json};

	use super::*;

	fn square() -> Value {
		json!({
			"type": "Polygon",
			"coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
		})
	}

	fn feature(properties: Value) -> Value {
		json!({ "type": "Feature", "properties": properties, "geometry": square() })
	}

	fn parse(features: Vec<Value>, layer: Layer, localized: bool) -> WofLayer {
		let collection = json!({ "type": "FeatureCollection", "features": features });
		parse_layer(&serde_json::to_vec(&collection).unwrap(), layer, localized).unwrap()
	}

	#[test]
	fn decodes_wof_properties() {
		let parsed = parse(
			vec![feature(json!({
				"wof:id": 85633147,
				"wof:name": "France",
				"wof:placetype": "country",
				"wof:shortcode": "FR",
				"wof:hierarchy": [{ "continent_id": 102191581, "country_id": 85633147, "empire_id": -1 }],
				"geom:latitude": 46.6,
				"geom:longitude": 2.4,
				"geom:bbox": "-5.1,41.3,9.6,51.1",
				"mz:is_current": 1
			}))],
			Layer::Country,
			false,
		);

		assert_eq!(parsed.skipped, 0);
		assert_eq!(parsed.shapes.len(), 1);
		let record = &parsed.records[0];
		assert_eq!(record.id.as_str(), "85633147");
		assert_eq!(record.metadata.name, "France");
		assert_eq!(record.metadata.abbreviation.as_deref(), Some("FR"));
		assert_eq!(record.metadata.centroid, Some(Coordinates { lat: 46.6, lon: 2.4 }));
		assert_eq!(
			record.metadata.bbox,
			Some(BoundingBox {
				min_lon: -5.1,
				min_lat: 41.3,
				max_lon: 9.6,
				max_lat: 51.1
			})
		);
		let ancestors: Vec<(&str, &str)> = record.hierarchy[0].iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
		assert_eq!(ancestors, vec![("continent_id", "102191581"), ("country_id", "85633147")]);
	}

	#[test]
	fn retired_features_are_skipped() {
		let parsed = parse(
			vec![
				feature(json!({ "wof:id": 1, "wof:name": "Old", "mz:is_current": 0 })),
				feature(json!({ "wof:id": 2, "wof:name": "Gone", "edtf:deprecated": "2017-03-01" })),
				feature(json!({ "wof:id": 3, "wof:name": "Merged", "wof:superseded_by": [4] })),
				feature(json!({ "wof:id": 4, "wof:name": "Kept", "mz:is_current": -1, "edtf:deprecated": "" })),
			],
			Layer::Locality,
			false,
		);

		assert_eq!(parsed.skipped, 3);
		assert_eq!(parsed.records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["4"]);
	}

	#[test]
	fn localized_names_prefer_english() {
		let properties = json!({
			"wof:id": 85682555,
			"wof:name": "Bayern",
			"name:eng_x_preferred": ["Bavaria"]
		});

		let plain = parse(vec![feature(properties.clone())], Layer::Region, false);
		let localized = parse(vec![feature(properties)], Layer::Region, true);

		assert_eq!(plain.records[0].metadata.name, "Bayern");
		assert_eq!(localized.records[0].metadata.name, "Bavaria");
	}

	#[test]
	fn label_position_backs_up_geometry_centroid() {
		let parsed = parse(
			vec![feature(json!({ "wof:id": 7, "wof:name": "X", "lbl:latitude": 10.0, "lbl:longitude": 20.0 }))],
			Layer::County,
			false,
		);
		assert_eq!(parsed.records[0].metadata.centroid, Some(Coordinates { lat: 10.0, lon: 20.0 }));
	}

	#[test]
	fn point_features_keep_their_record_but_are_not_indexed() {
		let collection = vec![json!({
			"type": "Feature",
			"properties": { "wof:id": "5", "wof:name": "Dot" },
			"geometry": { "type": "Point", "coordinates": [1.0, 1.0] }
		})];
		let parsed = parse(collection, Layer::Neighbourhood, false);

		assert_eq!(parsed.records.len(), 1);
		assert!(parsed.shapes.is_empty());
	}

	#[test]
	fn foreign_placetypes_and_bad_geometry_are_skipped() {
		let parsed = parse(
			vec![
				feature(json!({ "wof:id": 1, "wof:name": "A", "wof:placetype": "country" })),
				json!({
					"type": "Feature",
					"properties": { "wof:id": 2, "wof:name": "B" },
					"geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0]]] }
				}),
				feature(json!({ "wof:name": "no id" })),
			],
			Layer::Locality,
			false,
		);
		assert_eq!(parsed.skipped, 3);
		assert!(parsed.records.is_empty());
	}

	#[test]
	fn odd_properties_only_cost_their_feature() {
		let parsed = parse(
			vec![
				feature(json!({ "wof:id": 1, "wof:name": "Kept" })),
				feature(json!({
					"wof:id": 2,
					"wof:name": "Nulls",
					"wof:superseded_by": null,
					"wof:hierarchy": [{ "locality_id": 2, "region_id": null }],
					"name:eng_x_preferred": null,
					"geom:latitude": "46.6",
					"geom:longitude": "2.4"
				})),
				feature(json!({ "wof:id": 3, "wof:name": 42 })),
				json!("not a feature"),
			],
			Layer::Locality,
			false,
		);

		assert_eq!(parsed.skipped, 2);
		assert_eq!(parsed.records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
		assert_eq!(parsed.shapes.len(), 2);
		let nulls = &parsed.records[1];
		assert_eq!(nulls.metadata.centroid, Some(Coordinates { lat: 46.6, lon: 2.4 }));
		assert_eq!(nulls.hierarchy[0].iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>(), vec![("locality_id", "2")]);
	}

	#[test]
	fn malformed_collection_is_an_error() {
		assert!(matches!(parse_layer(b"{\"features\": 3}", Layer::Ocean, false), Err(IndexError::Collection(_))));
	}
}
