//! In-crate fixtures: a layer source whose indexes return a fixed answer.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::coords::Coordinates;
use crate::dataset::{FeatureId, FeatureRecord};
use crate::error::LoadError;
use crate::layer::Layer;
use crate::protocol::LoadCommand;
use crate::unit::{LayerSource, LoadedLayer, PointIndex};

pub(crate) struct FixedIndex(Option<FeatureId>);

impl PointIndex for FixedIndex {
	fn locate(&self, _point: Coordinates) -> Option<FeatureId> {
		self.0.clone()
	}
}

/// Serves the configured layers; every other layer fails to load.
#[derive(Default)]
pub(crate) struct StaticSource {
	layers: FxHashMap<Layer, (Option<FeatureId>, Vec<FeatureRecord>)>,
}

impl StaticSource {
	pub(crate) fn with_layer(mut self, layer: Layer, hit: Option<&str>, records: Vec<FeatureRecord>) -> Self {
		self.layers.insert(layer, (hit.map(FeatureId::from), records));
		self
	}
}

impl LayerSource for StaticSource {
	fn load(&self, command: &LoadCommand) -> Result<LoadedLayer, LoadError> {
		let Some((hit, records)) = self.layers.get(&command.layer) else {
			return Err(LoadError::Missing {
				layer: command.layer,
				path: command.datapath.join(format!("{}.geojson", command.layer)),
			});
		};
		Ok(LoadedLayer {
			index: Arc::new(FixedIndex(hit.clone())),
			records: records.clone(),
		})
	}
}
