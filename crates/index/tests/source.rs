#![allow(unused_crate_dependencies)]

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use strata_index::GeoJsonSource;
use strata_pip::{Coordinates, GeocoderOptions, Layer, LayerSource, LoadCommand, LoadError, PoolOptions, ReverseGeocoder};

fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> serde_json::Value {
	json!({
		"type": "Polygon",
		"coordinates": [[[min_lon, min_lat], [max_lon, min_lat], [max_lon, max_lat], [min_lon, max_lat], [min_lon, min_lat]]]
	})
}

fn write_layer(dir: &Path, layer: Layer, features: Vec<serde_json::Value>) {
	let collection = json!({ "type": "FeatureCollection", "features": features });
	std::fs::write(GeoJsonSource::layer_path(dir, layer), serde_json::to_vec(&collection).unwrap()).unwrap();
}

fn command(dir: &Path, layer: Layer) -> LoadCommand {
	LoadCommand {
		layer,
		datapath: dir.to_path_buf(),
		localized_admin_names: false,
	}
}

fn fixture(dir: &Path) {
	write_layer(dir, Layer::Country, vec![json!({
		"type": "Feature",
		"properties": {
			"wof:id": 85633147,
			"wof:name": "France",
			"wof:placetype": "country",
			"wof:hierarchy": [{ "country_id": 85633147 }]
		},
		"geometry": square(-5.0, 42.0, 8.0, 51.0)
	})]);
	write_layer(dir, Layer::Locality, vec![json!({
		"type": "Feature",
		"properties": {
			"wof:id": 101751119,
			"wof:name": "Paris",
			"wof:placetype": "locality",
			"wof:hierarchy": [{ "locality_id": 101751119, "country_id": 85633147 }]
		},
		"geometry": square(2.2, 48.8, 2.5, 48.9)
	})]);
}

#[test]
fn missing_file_is_reported_as_missing() {
	let dir = tempfile::tempdir().unwrap();
	let err = GeoJsonSource::new().load(&command(dir.path(), Layer::Borough)).unwrap_err();
	assert!(matches!(err, LoadError::Missing { layer: Layer::Borough, .. }), "{err}");
}

#[test]
fn garbage_file_is_a_parse_error() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(GeoJsonSource::layer_path(dir.path(), Layer::Ocean), b"not json").unwrap();
	let err = GeoJsonSource::new().load(&command(dir.path(), Layer::Ocean)).unwrap_err();
	assert!(matches!(err, LoadError::Parse { layer: Layer::Ocean, .. }), "{err}");
}

#[test]
fn loads_records_and_index() {
	let dir = tempfile::tempdir().unwrap();
	fixture(dir.path());

	let loaded = GeoJsonSource::new().load(&command(dir.path(), Layer::Locality)).unwrap();
	assert_eq!(loaded.records.len(), 1);
	assert_eq!(loaded.records[0].metadata.name, "Paris");
	assert_eq!(
		loaded.index.locate(Coordinates::new(48.85, 2.35).unwrap()).map(|id| id.0),
		Some("101751119".to_string())
	);
	assert_eq!(loaded.index.locate(Coordinates::new(45.0, 2.35).unwrap()), None);
}

#[tokio::test]
async fn geocoder_over_geojson_layers() {
	let dir = tempfile::tempdir().unwrap();
	fixture(dir.path());

	let options = GeocoderOptions::new(PoolOptions::new(dir.path()).layers([Layer::Locality, Layer::Region, Layer::Country]));
	let geocoder = ReverseGeocoder::create(options, Arc::new(GeoJsonSource::new())).await.unwrap();
	assert_eq!(geocoder.active_layers(), &[Layer::Locality, Layer::Country]);

	let paris = geocoder.lookup(Coordinates::new(48.85, 2.35).unwrap(), None).await.unwrap();
	let names: Vec<&str> = paris.iter().map(|r| r.metadata.name.as_str()).collect();
	assert_eq!(names, vec!["Paris", "France"]);

	let lyon = geocoder.lookup(Coordinates::new(45.76, 4.83).unwrap(), None).await.unwrap();
	let names: Vec<&str> = lyon.iter().map(|r| r.metadata.name.as_str()).collect();
	assert_eq!(names, vec!["France"]);

	let sea = geocoder.lookup(Coordinates::new(0.0, -30.0).unwrap(), None).await.unwrap();
	assert!(sea.is_empty());

	geocoder.shutdown().await;
}
