//! Search unit pool: startup handshake and teardown.
//!
//! Startup spawns one unit per effective layer, sends each a `Load`, and then
//! consumes unit events until every unit has answered. `Loaded` contributions
//! merge into the dataset as they arrive; `LoadFailed` units are torn down and
//! their layer is left out. The dataset is frozen before [`SearchUnitPool::create`]
//! returns.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dataset::{DatasetBuilder, FeatureDataset};
use crate::error::PoolError;
use crate::layer::{Layer, effective_layers};
use crate::protocol::{LoadCommand, UnitCommand, UnitEvent};
use crate::unit::{DispatchError, LayerSource, UnitHandle};

/// Default unit mailbox capacity.
const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Pool startup configuration.
#[derive(Debug, Clone)]
pub struct PoolOptions {
	pub datapath: PathBuf,
	/// Requested layers; empty means every layer.
	pub layers: Vec<Layer>,
	pub localized_admin_names: bool,
	/// Per-unit mailbox bound. Searches beyond it wait in the coordinator.
	pub mailbox_capacity: usize,
	/// Upper bound on startup. `None` waits for every unit indefinitely.
	pub load_timeout: Option<Duration>,
}

impl PoolOptions {
	pub fn new(datapath: impl Into<PathBuf>) -> Self {
		Self {
			datapath: datapath.into(),
			layers: Vec::new(),
			localized_admin_names: false,
			mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
			load_timeout: None,
		}
	}

	#[must_use]
	pub fn layers(mut self, layers: impl IntoIterator<Item = Layer>) -> Self {
		self.layers = layers.into_iter().collect();
		self
	}

	#[must_use]
	pub fn localized_admin_names(mut self, enabled: bool) -> Self {
		self.localized_admin_names = enabled;
		self
	}

	/// # Panics
	///
	/// Panics if `capacity` is zero.
	#[must_use]
	pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		self.mailbox_capacity = capacity;
		self
	}

	#[must_use]
	pub fn load_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.load_timeout = timeout;
		self
	}
}

/// A pool that finished loading.
#[derive(Debug)]
pub struct StartedPool {
	pub pool: SearchUnitPool,
	pub dataset: Arc<FeatureDataset>,
	/// Unit events from here on: search replies only.
	pub events: mpsc::UnboundedReceiver<UnitEvent>,
}

/// Owns one search unit per active layer.
#[derive(Debug)]
pub struct SearchUnitPool {
	/// Canonical order.
	units: Vec<UnitHandle>,
	layers: Vec<Layer>,
	/// Held so the event channel outlives individual units.
	_events: mpsc::UnboundedSender<UnitEvent>,
	cancel: CancellationToken,
}

impl Drop for SearchUnitPool {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

impl SearchUnitPool {
	/// Spawns and loads one unit per effective layer, in parallel.
	///
	/// `parent` cancels the whole pool when fired.
	pub async fn create(options: &PoolOptions, source: Arc<dyn LayerSource>, parent: &CancellationToken) -> Result<StartedPool, PoolError> {
		let requested = (!options.layers.is_empty()).then_some(options.layers.as_slice());
		let layers = effective_layers(requested, &Layer::ALL);
		let cancel = parent.child_token();
		let (events_tx, mut events_rx) = mpsc::unbounded_channel();

		let mut units = Vec::with_capacity(layers.len());
		for layer in layers {
			let unit = UnitHandle::spawn(layer, Arc::clone(&source), events_tx.clone(), options.mailbox_capacity, cancel.child_token());
			let command = LoadCommand {
				layer,
				datapath: options.datapath.clone(),
				localized_admin_names: options.localized_admin_names,
			};
			if let Err(err) = unit.try_send(UnitCommand::Load(command)) {
				tracing::warn!(%layer, error = ?err, "pip.unit.load_rejected");
				unit.shutdown().await;
				continue;
			}
			units.push(unit);
		}

		let mut builder = DatasetBuilder::new();
		let mut waiting: BTreeSet<Layer> = units.iter().map(UnitHandle::layer).collect();
		let mut failed = Vec::new();

		let collect = async {
			while !waiting.is_empty() {
				let Some(event) = events_rx.recv().await else {
					return Err(PoolError::EventsClosed);
				};
				match event {
					UnitEvent::Loaded { layer, elapsed, records } => {
						if !waiting.remove(&layer) {
							continue;
						}
						let count = records.len();
						let added = builder.merge(layer, records);
						tracing::info!(%layer, records = count, added, elapsed_ms = elapsed.as_millis() as u64, "pip.unit.loaded");
					}
					UnitEvent::LoadFailed { layer, error } => {
						if waiting.remove(&layer) {
							tracing::warn!(%layer, %error, "pip.unit.load_failed");
							failed.push(layer);
						}
					}
					other => {
						tracing::debug!(layer = %other.layer(), "pip.pool.unexpected_event");
					}
				}
			}
			Ok(())
		};

		let outcome = match options.load_timeout {
			Some(limit) => tokio::time::timeout(limit, collect).await.ok(),
			None => Some(collect.await),
		};

		let startup_error = match outcome {
			Some(Ok(())) => None,
			Some(Err(err)) => Some(err),
			None => Some(PoolError::LoadTimeout {
				pending: waiting.iter().copied().collect(),
			}),
		};
		if let Some(err) = startup_error {
			cancel.cancel();
			for unit in units {
				unit.shutdown().await;
			}
			return Err(err);
		}

		let mut active = Vec::with_capacity(units.len());
		for unit in units {
			if failed.contains(&unit.layer()) {
				unit.shutdown().await;
			} else {
				active.push(unit);
			}
		}

		let dataset = builder.freeze();
		let layers: Vec<Layer> = active.iter().map(UnitHandle::layer).collect();
		tracing::info!(layers = ?layers, records = dataset.len(), "pip.pool.ready");

		Ok(StartedPool {
			pool: Self {
				units: active,
				layers,
				_events: events_tx,
				cancel,
			},
			dataset,
			events: events_rx,
		})
	}

	/// Active layers in canonical order.
	pub fn layers(&self) -> &[Layer] {
		&self.layers
	}

	pub(crate) fn dispatch(&self, layer: Layer, cmd: UnitCommand) -> Result<(), DispatchError> {
		self.units
			.iter()
			.find(|unit| unit.layer() == layer)
			.ok_or(DispatchError::Closed)?
			.try_send(cmd)
	}

	#[cfg(test)]
	pub(crate) async fn stop_unit(&self, layer: Layer) {
		if let Some(unit) = self.units.iter().find(|unit| unit.layer() == layer) {
			unit.stop().await;
		}
	}

	/// Terminates every unit and waits for them to exit.
	pub async fn shutdown(mut self) {
		self.cancel.cancel();
		for unit in std::mem::take(&mut self.units) {
			unit.shutdown().await;
		}
		tracing::debug!(layers = ?self.layers, "pip.pool.shutdown");
	}
}
