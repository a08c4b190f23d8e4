//! Public service handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{CascadeCoordinator, Command};
use crate::coords::Coordinates;
use crate::dataset::{FeatureDataset, FeatureRecord};
use crate::error::{LookupError, PoolError};
use crate::layer::Layer;
use crate::pool::{PoolOptions, SearchUnitPool, StartedPool};
use crate::task::{self, TaskRole, join_error_message};
use crate::unit::LayerSource;

/// Outcome of one lookup: the matched feature's ancestor chain, finest first.
pub type LookupResult = Result<Vec<Arc<FeatureRecord>>, LookupError>;

const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct GeocoderOptions {
	pub pool: PoolOptions,
	/// Bound on each single-layer search.
	pub dispatch_timeout: Duration,
	/// Lookups queued ahead of the coordinator before callers wait.
	pub command_capacity: usize,
	/// Cap on lookups in flight. Beyond it new lookups fail with
	/// [`LookupError::Overloaded`]; `None` admits any number.
	pub max_pending: Option<usize>,
}

impl GeocoderOptions {
	pub fn new(pool: PoolOptions) -> Self {
		Self {
			pool,
			dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
			command_capacity: DEFAULT_COMMAND_CAPACITY,
			max_pending: None,
		}
	}

	#[must_use]
	pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
		self.dispatch_timeout = timeout;
		self
	}

	#[must_use]
	pub fn command_capacity(mut self, capacity: usize) -> Self {
		self.command_capacity = capacity.max(1);
		self
	}

	#[must_use]
	pub fn max_pending(mut self, limit: Option<usize>) -> Self {
		self.max_pending = limit;
		self
	}
}

/// Handle to a running reverse geocoder.
///
/// Dropping the handle cancels the coordinator and every search unit.
#[derive(Debug)]
pub struct ReverseGeocoder {
	commands: mpsc::Sender<Command>,
	layers: Vec<Layer>,
	dataset: Arc<FeatureDataset>,
	cancel: CancellationToken,
	join: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ReverseGeocoder {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

impl ReverseGeocoder {
	/// Loads every configured layer and starts the coordinator.
	///
	/// Layers whose data cannot be loaded are left out of [`Self::active_layers`].
	pub async fn create(options: GeocoderOptions, source: Arc<dyn LayerSource>) -> Result<Self, PoolError> {
		let cancel = CancellationToken::new();
		let StartedPool { pool, dataset, events } = SearchUnitPool::create(&options.pool, source, &cancel).await?;
		let layers = pool.layers().to_vec();

		let (commands, rx) = mpsc::channel(options.command_capacity.max(1));
		let coordinator = CascadeCoordinator::new(pool, Arc::clone(&dataset), options.dispatch_timeout, options.max_pending);
		let join = task::spawn(TaskRole::Coordinator, coordinator.run(rx, events, cancel.clone()));

		tracing::info!(layers = ?layers, records = dataset.len(), "pip.geocoder.ready");
		Ok(Self {
			commands,
			layers,
			dataset,
			cancel,
			join: Mutex::new(Some(join)),
		})
	}

	/// Finds the finest feature containing `point` and returns its ancestor chain.
	///
	/// `layers: None` searches every active layer; an empty slice searches none
	/// and yields an empty list.
	pub async fn lookup(&self, point: Coordinates, layers: Option<&[Layer]>) -> LookupResult {
		if self.cancel.is_cancelled() {
			return Err(LookupError::ShutDown);
		}
		request(&self.commands, point, layers.map(<[Layer]>::to_vec)).await
	}

	/// Callback form of [`Self::lookup`]. `callback` runs on a runtime task.
	pub fn lookup_with<F>(&self, point: Coordinates, layers: Option<Vec<Layer>>, callback: F)
	where
		F: FnOnce(LookupResult) + Send + 'static,
	{
		let commands = self.commands.clone();
		let cancel = self.cancel.clone();
		task::spawn(TaskRole::Callback, async move {
			let result = if cancel.is_cancelled() {
				Err(LookupError::ShutDown)
			} else {
				request(&commands, point, layers).await
			};
			callback(result);
		});
	}

	/// Layers with a running unit, in canonical order.
	pub fn active_layers(&self) -> &[Layer] {
		&self.layers
	}

	pub fn dataset(&self) -> &Arc<FeatureDataset> {
		&self.dataset
	}

	/// Stops the coordinator and every unit, then waits for them to exit.
	///
	/// Lookups still waiting resolve with [`LookupError::ShutDown`].
	pub async fn shutdown(&self) {
		self.cancel.cancel();
		let handle = self.join.lock().await.take();
		if let Some(handle) = handle
			&& let Err(err) = handle.await
		{
			tracing::warn!(error = %join_error_message(err), "pip.geocoder.join_failed");
		}
	}
}

async fn request(commands: &mpsc::Sender<Command>, point: Coordinates, layers: Option<Vec<Layer>>) -> LookupResult {
	let (reply, rx) = oneshot::channel();
	commands
		.send(Command::Lookup { point, layers, reply })
		.await
		.map_err(|_| LookupError::ShutDown)?;
	rx.await.unwrap_or(Err(LookupError::ShutDown))
}
