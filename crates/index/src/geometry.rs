//! GeoJSON geometry conversion and the per-layer containment index.

use geo::{Area, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use rstar::{AABB, RTree, RTreeObject};
use serde::Deserialize;
use serde_json::Value;
use strata_pip::{Coordinates, FeatureId, PointIndex};

use crate::IndexError;

/// A GeoJSON geometry object with its coordinates left undecoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometry {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub coordinates: Value,
}

type Ring = Vec<Vec<f64>>;

/// Converts a `Polygon` or `MultiPolygon` geometry.
///
/// Returns `Ok(None)` for every other geometry type.
pub fn to_multi_polygon(id: &str, raw: &RawGeometry) -> Result<Option<MultiPolygon<f64>>, IndexError> {
	let invalid = |message: String| IndexError::Geometry {
		id: id.to_string(),
		kind: raw.kind.clone(),
		message,
	};

	match raw.kind.as_str() {
		"Polygon" => {
			let rings = Vec::<Ring>::deserialize(&raw.coordinates).map_err(|err| invalid(err.to_string()))?;
			Ok(Some(MultiPolygon::new(vec![polygon(rings).map_err(invalid)?])))
		}
		"MultiPolygon" => {
			let parts = Vec::<Vec<Ring>>::deserialize(&raw.coordinates).map_err(|err| invalid(err.to_string()))?;
			let polygons = parts.into_iter().map(polygon).collect::<Result<Vec<_>, _>>().map_err(invalid)?;
			Ok(Some(MultiPolygon::new(polygons)))
		}
		_ => Ok(None),
	}
}

fn polygon(rings: Vec<Ring>) -> Result<Polygon<f64>, String> {
	let mut rings = rings.into_iter().map(ring);
	let exterior = rings.next().ok_or_else(|| "polygon has no rings".to_string())??;
	let interiors = rings.collect::<Result<Vec<_>, _>>()?;
	Ok(Polygon::new(exterior, interiors))
}

fn ring(positions: Ring) -> Result<LineString<f64>, String> {
	if positions.len() < 3 {
		return Err(format!("ring has {} positions, need at least 3", positions.len()));
	}
	positions
		.into_iter()
		.map(|position| match position.as_slice() {
			[x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
			_ => Err(format!("invalid position {position:?}")),
		})
		.collect::<Result<Vec<_>, _>>()
		.map(LineString::new)
}

#[derive(Debug)]
struct Entry {
	id: FeatureId,
	area: f64,
	shape: MultiPolygon<f64>,
}

/// Bounding box of `entries[slot]`.
#[derive(Debug)]
struct Bounds {
	slot: usize,
	envelope: AABB<[f64; 2]>,
}

impl RTreeObject for Bounds {
	type Envelope = AABB<[f64; 2]>;

	fn envelope(&self) -> Self::Envelope {
		self.envelope
	}
}

/// Polygons of one layer, smallest area first, behind an R-tree of their
/// bounding boxes.
///
/// A point on a boundary counts as inside. Where polygons overlap, the one
/// with the smallest area wins; equal areas fall back to id order.
#[derive(Debug, Default)]
pub struct PolygonIndex {
	entries: Vec<Entry>,
	tree: RTree<Bounds>,
}

impl PolygonIndex {
	/// Builds the index. Empty shapes are dropped.
	pub fn new(shapes: impl IntoIterator<Item = (FeatureId, MultiPolygon<f64>)>) -> Self {
		let mut entries: Vec<(Entry, AABB<[f64; 2]>)> = shapes
			.into_iter()
			.filter_map(|(id, shape)| {
				let rect = shape.bounding_rect()?;
				let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
				Some((
					Entry {
						area: shape.unsigned_area(),
						id,
						shape,
					},
					envelope,
				))
			})
			.collect();
		entries.sort_by(|(a, _), (b, _)| a.area.total_cmp(&b.area).then_with(|| a.id.cmp(&b.id)));

		let bounds = entries.iter().enumerate().map(|(slot, (_, envelope))| Bounds { slot, envelope: *envelope }).collect();
		Self {
			entries: entries.into_iter().map(|(entry, _)| entry).collect(),
			tree: RTree::bulk_load(bounds),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl PointIndex for PolygonIndex {
	fn locate(&self, point: Coordinates) -> Option<FeatureId> {
		let query = AABB::from_point([point.lon, point.lat]);
		let point = Point::new(point.lon, point.lat);
		self.tree
			.locate_in_envelope_intersecting(&query)
			.map(|bounds| bounds.slot)
			.filter(|&slot| self.entries[slot].shape.intersects(&point))
			.min()
			.map(|slot| self.entries[slot].id.clone())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn raw(value: Value) -> RawGeometry {
		serde_json::from_value(value).unwrap()
	}

	fn square(min: f64, max: f64) -> MultiPolygon<f64> {
		let geometry = raw(json!({
			"type": "Polygon",
			"coordinates": [[[min, min], [max, min], [max, max], [min, max], [min, min]]]
		}));
		to_multi_polygon("sq", &geometry).unwrap().unwrap()
	}

	fn at(lat: f64, lon: f64) -> Coordinates {
		Coordinates::new(lat, lon).unwrap()
	}

	#[test]
	fn smallest_overlapping_polygon_wins() {
		let index = PolygonIndex::new([
			(FeatureId::from("outer"), square(0.0, 10.0)),
			(FeatureId::from("inner"), square(2.0, 4.0)),
		]);

		assert_eq!(index.locate(at(3.0, 3.0)), Some(FeatureId::from("inner")));
		assert_eq!(index.locate(at(8.0, 8.0)), Some(FeatureId::from("outer")));
		assert_eq!(index.locate(at(20.0, 20.0)), None);
	}

	#[test]
	fn boundary_points_are_inside() {
		let index = PolygonIndex::new([(FeatureId::from("a"), square(0.0, 1.0))]);
		assert_eq!(index.locate(at(0.0, 0.5)), Some(FeatureId::from("a")));
	}

	#[test]
	fn holes_are_excluded() {
		let geometry = raw(json!({
			"type": "Polygon",
			"coordinates": [
				[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
				[[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
			]
		}));
		let shape = to_multi_polygon("donut", &geometry).unwrap().unwrap();
		let index = PolygonIndex::new([(FeatureId::from("donut"), shape)]);

		assert_eq!(index.locate(at(5.0, 5.0)), None);
		assert_eq!(index.locate(at(2.0, 2.0)), Some(FeatureId::from("donut")));
	}

	#[test]
	fn multipolygon_parts_are_all_searched() {
		let geometry = raw(json!({
			"type": "MultiPolygon",
			"coordinates": [
				[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
				[[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]]]
			]
		}));
		let shape = to_multi_polygon("islands", &geometry).unwrap().unwrap();
		let index = PolygonIndex::new([(FeatureId::from("islands"), shape)]);

		assert_eq!(index.locate(at(5.5, 5.5)), Some(FeatureId::from("islands")));
		assert_eq!(index.locate(at(3.0, 3.0)), None);
	}

	#[test]
	fn point_geometry_is_not_indexed() {
		let geometry = raw(json!({ "type": "Point", "coordinates": [1.0, 2.0] }));
		assert!(to_multi_polygon("p", &geometry).unwrap().is_none());
	}

	#[test]
	fn degenerate_ring_is_rejected() {
		let geometry = raw(json!({ "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 1.0]]] }));
		let err = to_multi_polygon("bad", &geometry).unwrap_err();
		assert!(err.to_string().contains("feature bad"), "{err}");
	}

	fn cell(x: usize, y: usize) -> MultiPolygon<f64> {
		let (x, y) = (x as f64, y as f64);
		MultiPolygon::new(vec![Polygon::new(
			LineString::from(vec![(x, y), (x + 1.0, y), (x + 1.0, y + 1.0), (x, y + 1.0), (x, y)]),
			Vec::new(),
		)])
	}

	#[test]
	fn grid_lookups_pick_the_containing_cell() {
		let cells = (0..60).flat_map(|x| (0..60).map(move |y| (FeatureId(format!("{x}:{y}")), cell(x, y))));
		let index = PolygonIndex::new(cells.chain([(FeatureId::from("world"), square(-1.0, 80.0))]));
		assert_eq!(index.len(), 3601);

		assert_eq!(index.locate(at(12.5, 37.5)), Some(FeatureId::from("37:12")));
		assert_eq!(index.locate(at(59.5, 0.5)), Some(FeatureId::from("0:59")));
		assert_eq!(index.locate(at(70.0, 70.0)), Some(FeatureId::from("world")));
		assert_eq!(index.locate(at(85.0, 85.0)), None);
	}

	#[test]
	fn equal_areas_fall_back_to_id_order() {
		let index = PolygonIndex::new([(FeatureId::from("b"), square(0.0, 1.0)), (FeatureId::from("a"), square(0.0, 1.0))]);
		assert_eq!(index.locate(at(0.5, 0.5)), Some(FeatureId::from("a")));
	}

	#[test]
	fn empty_index_misses() {
		let index = PolygonIndex::default();
		assert!(index.is_empty());
		assert_eq!(index.locate(at(0.0, 0.0)), None);
	}
}
