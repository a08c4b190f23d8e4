//! Search units: one task per layer, each exclusively owning that layer's index.
//!
//! A unit is driven entirely through its mailbox. `Load` builds the index on
//! the blocking pool and hands the layer's records back in a single
//! [`UnitEvent::Loaded`]; `Search` answers one containment query. Both are
//! raced against the unit's cancellation token so shutdown never waits on a
//! slow index.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coords::Coordinates;
use crate::dataset::{FeatureId, FeatureRecord};
use crate::error::LoadError;
use crate::layer::Layer;
use crate::protocol::{LoadCommand, UnitCommand, UnitEvent};
use crate::task::{self, TaskRole, join_error_message};

/// Point containment over one layer's geometries.
pub trait PointIndex: Send + Sync + 'static {
	/// Returns the feature containing `point`, if any. Overlap resolution is up to the index.
	fn locate(&self, point: Coordinates) -> Option<FeatureId>;
}

/// Result of loading one layer: its index plus the records handed to the coordinator.
pub struct LoadedLayer {
	pub index: Arc<dyn PointIndex>,
	pub records: Vec<FeatureRecord>,
}

impl std::fmt::Debug for LoadedLayer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LoadedLayer").field("records", &self.records.len()).finish_non_exhaustive()
	}
}

/// Builds layer indexes. Called on the blocking pool, once per unit.
pub trait LayerSource: Send + Sync + 'static {
	fn load(&self, command: &LoadCommand) -> Result<LoadedLayer, LoadError>;
}

/// Reason a command could not be queued on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchError {
	Closed,
	Full,
}

/// Coordinator-side handle to one running unit.
#[derive(Debug)]
pub(crate) struct UnitHandle {
	layer: Layer,
	tx: mpsc::Sender<UnitCommand>,
	cancel: CancellationToken,
	join: JoinHandle<()>,
}

impl UnitHandle {
	/// Spawns the unit's mailbox loop. `cancel` should be a child of the service token.
	pub(crate) fn spawn(
		layer: Layer,
		source: Arc<dyn LayerSource>,
		events: mpsc::UnboundedSender<UnitEvent>,
		capacity: usize,
		cancel: CancellationToken,
	) -> Self {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		let join = task::spawn(TaskRole::Unit, run_unit(layer, rx, source, events, cancel.clone()));
		Self { layer, tx, cancel, join }
	}

	pub(crate) fn layer(&self) -> Layer {
		self.layer
	}

	/// Non-blocking enqueue.
	pub(crate) fn try_send(&self, cmd: UnitCommand) -> Result<(), DispatchError> {
		self.tx.try_send(cmd).map_err(|err| match err {
			mpsc::error::TrySendError::Full(_) => DispatchError::Full,
			mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
		})
	}

	/// Stops the unit's loop but keeps the handle, leaving its mailbox closed.
	#[cfg(test)]
	pub(crate) async fn stop(&self) {
		self.cancel.cancel();
		self.tx.closed().await;
	}

	/// Cancels the unit and waits for its loop to exit.
	pub(crate) async fn shutdown(self) {
		self.cancel.cancel();
		if let Err(err) = self.join.await {
			tracing::warn!(layer = %self.layer, error = %join_error_message(err), "pip.unit.join_failed");
		}
	}
}

async fn run_unit(
	layer: Layer,
	mut rx: mpsc::Receiver<UnitCommand>,
	source: Arc<dyn LayerSource>,
	events: mpsc::UnboundedSender<UnitEvent>,
	cancel: CancellationToken,
) {
	let mut index: Option<Arc<dyn PointIndex>> = None;

	loop {
		let cmd = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			msg = rx.recv() => {
				let Some(cmd) = msg else {
					break;
				};
				cmd
			}
		};

		let event = match cmd {
			UnitCommand::Load(command) => {
				let started = Instant::now();
				let task_source = Arc::clone(&source);
				let build = task::spawn_blocking(TaskRole::IndexBuild, move || task_source.load(&command));
				let result = tokio::select! {
					biased;
					_ = cancel.cancelled() => break,
					res = build => res,
				};
				match result {
					Ok(Ok(loaded)) => {
						index = Some(loaded.index);
						UnitEvent::Loaded {
							layer,
							elapsed: started.elapsed(),
							records: loaded.records,
						}
					}
					Ok(Err(err)) => UnitEvent::LoadFailed {
						layer,
						error: err.to_string(),
					},
					Err(err) => UnitEvent::LoadFailed {
						layer,
						error: join_error_message(err),
					},
				}
			}
			UnitCommand::Search { request_id, point } => match &index {
				None => UnitEvent::SearchFailed {
					request_id,
					layer,
					error: "index not loaded".to_string(),
				},
				Some(loaded) => {
					let loaded = Arc::clone(loaded);
					let query = task::spawn_blocking(TaskRole::Query, move || loaded.locate(point));
					let result = tokio::select! {
						biased;
						_ = cancel.cancelled() => break,
						res = query => res,
					};
					match result {
						Ok(hit) => UnitEvent::Results { request_id, layer, hit },
						Err(err) => UnitEvent::SearchFailed {
							request_id,
							layer,
							error: join_error_message(err),
						},
					}
				}
			},
		};

		if events.send(event).is_err() {
			break;
		}
	}

	tracing::debug!(%layer, "pip.unit.stopped");
}
