use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use strata_pip::{Layer, LayerSource, LoadCommand, LoadError, LoadedLayer};

use crate::geometry::PolygonIndex;
use crate::wof::parse_layer;

/// Loads layers from `<datapath>/<layer>.geojson`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonSource;

impl GeoJsonSource {
	pub fn new() -> Self {
		Self
	}

	/// Location of `layer`'s data file under `datapath`.
	pub fn layer_path(datapath: &Path, layer: Layer) -> PathBuf {
		datapath.join(format!("{layer}.geojson"))
	}
}

impl LayerSource for GeoJsonSource {
	fn load(&self, command: &LoadCommand) -> Result<LoadedLayer, LoadError> {
		let layer = command.layer;
		let path = Self::layer_path(&command.datapath, layer);
		let started = Instant::now();

		let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
			io::ErrorKind::NotFound => LoadError::Missing { layer, path: path.clone() },
			_ => LoadError::Read { path: path.clone(), source },
		})?;

		let parsed = parse_layer(&bytes, layer, command.localized_admin_names).map_err(|err| LoadError::Parse {
			layer,
			message: err.to_string(),
		})?;

		let index = PolygonIndex::new(parsed.shapes);
		tracing::info!(
			%layer,
			path = %path.display(),
			records = parsed.records.len(),
			polygons = index.len(),
			skipped = parsed.skipped,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"index.layer.built"
		);

		Ok(LoadedLayer {
			index: Arc::new(index),
			records: parsed.records,
		})
	}
}
