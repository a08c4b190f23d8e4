#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use strata_pip::{
	AncestorMap, Coordinates, FeatureId, FeatureMetadata, FeatureRecord, GeocoderOptions, Layer, LayerSource, LoadCommand, LoadError,
	LoadedLayer, PointIndex, PoolOptions,
};

/// Blocks scripted work until opened. Waiters give up after a few seconds so a
/// failing test cannot wedge the blocking pool.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
	pub fn open(&self) {
		let (lock, cvar) = &*self.0;
		*lock.lock().unwrap() = true;
		cvar.notify_all();
	}

	fn wait(&self) {
		let (lock, cvar) = &*self.0;
		let guard = lock.lock().unwrap();
		let _ = cvar.wait_timeout_while(guard, Duration::from_secs(5), |open| !*open).unwrap();
	}
}

/// How a scripted index answers a query.
#[derive(Clone)]
pub enum Mode {
	Answer,
	Delay(Duration),
	Hang(Gate),
	Panic,
}

/// Every `locate` call, in arrival order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(Layer, Coordinates)>>>);

impl CallLog {
	pub fn layers(&self) -> Vec<Layer> {
		self.0.lock().unwrap().iter().map(|(layer, _)| *layer).collect()
	}

	pub fn layers_for(&self, point: Coordinates) -> Vec<Layer> {
		self.0.lock().unwrap().iter().filter(|(_, p)| *p == point).map(|(layer, _)| *layer).collect()
	}

	pub fn len(&self) -> usize {
		self.0.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

struct ScriptedIndex {
	layer: Layer,
	hit: Option<FeatureId>,
	mode: Mode,
	calls: CallLog,
}

impl PointIndex for ScriptedIndex {
	fn locate(&self, point: Coordinates) -> Option<FeatureId> {
		self.calls.0.lock().unwrap().push((self.layer, point));
		match &self.mode {
			Mode::Answer => {}
			Mode::Delay(delay) => std::thread::sleep(*delay),
			Mode::Hang(gate) => gate.wait(),
			Mode::Panic => panic!("index for {} is corrupt", self.layer),
		}
		self.hit.clone()
	}
}

struct LayerScript {
	hit: Option<FeatureId>,
	records: Vec<FeatureRecord>,
	mode: Mode,
	load_gate: Option<Gate>,
}

/// Layer source driven by per-layer scripts. Unscripted layers fail to load.
#[derive(Default)]
pub struct ScriptedSource {
	layers: HashMap<Layer, LayerScript>,
	calls: CallLog,
}

impl ScriptedSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// A layer whose index always misses.
	pub fn miss(self, layer: Layer) -> Self {
		self.layer(layer, None, Vec::new(), Mode::Answer)
	}

	/// A layer whose index always returns `hit`.
	pub fn hit(self, layer: Layer, hit: &str, records: Vec<FeatureRecord>) -> Self {
		self.layer(layer, Some(hit), records, Mode::Answer)
	}

	pub fn layer(mut self, layer: Layer, hit: Option<&str>, records: Vec<FeatureRecord>, mode: Mode) -> Self {
		self.layers.insert(
			layer,
			LayerScript {
				hit: hit.map(FeatureId::from),
				records,
				mode,
				load_gate: None,
			},
		);
		self
	}

	/// Makes `layer`'s load block until `gate` opens.
	pub fn slow_load(mut self, layer: Layer, gate: Gate) -> Self {
		if let Some(script) = self.layers.get_mut(&layer) {
			script.load_gate = Some(gate);
		}
		self
	}

	pub fn calls(&self) -> CallLog {
		self.calls.clone()
	}
}

impl LayerSource for ScriptedSource {
	fn load(&self, command: &LoadCommand) -> Result<LoadedLayer, LoadError> {
		let Some(script) = self.layers.get(&command.layer) else {
			return Err(LoadError::Missing {
				layer: command.layer,
				path: command.datapath.join(format!("{}.geojson", command.layer)),
			});
		};
		if let Some(gate) = &script.load_gate {
			gate.wait();
		}
		Ok(LoadedLayer {
			index: Arc::new(ScriptedIndex {
				layer: command.layer,
				hit: script.hit.clone(),
				mode: script.mode.clone(),
				calls: self.calls.clone(),
			}),
			records: script.records.clone(),
		})
	}
}

pub fn record(id: &str, placetype: Layer, ancestors: &[(&str, &str)]) -> FeatureRecord {
	let hierarchy = if ancestors.is_empty() {
		Vec::new()
	} else {
		let map: AncestorMap = ancestors.iter().map(|(k, v)| ((*k).to_string(), FeatureId::from(*v))).collect();
		vec![map]
	};
	FeatureRecord {
		id: FeatureId::from(id),
		hierarchy,
		metadata: FeatureMetadata {
			name: format!("{placetype} {id}"),
			placetype,
			abbreviation: None,
			centroid: None,
			bbox: None,
		},
	}
}

pub fn options(layers: &[Layer]) -> GeocoderOptions {
	GeocoderOptions::new(PoolOptions::new("/data/wof").layers(layers.iter().copied()))
}

pub fn point(lat: f64, lon: f64) -> Coordinates {
	Coordinates::new(lat, lon).unwrap()
}
