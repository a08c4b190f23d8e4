//! Error types for the coordinator, the unit pool and layer loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::layer::Layer;

/// A layer name that is not part of the canonical set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown layer: {0}")]
pub struct UnknownLayer(pub String);

/// Rejected coordinate input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
	#[error("latitude out of range: {0}")]
	Latitude(f64),
	#[error("longitude out of range: {0}")]
	Longitude(f64),
}

/// Failure to build one layer's index. Soft: only that layer is dropped.
#[derive(Debug, Error)]
pub enum LoadError {
	/// The layer has no data file.
	#[error("no data for layer {layer} at {}", path.display())]
	Missing { layer: Layer, path: PathBuf },

	/// The data file exists but could not be read.
	#[error("I/O error reading {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The data file could not be decoded.
	#[error("invalid data for layer {layer}: {message}")]
	Parse { layer: Layer, message: String },
}

/// Failure to bring the unit pool up.
#[derive(Debug, Error)]
pub enum PoolError {
	/// Some units did not acknowledge `Load` within the configured startup timeout.
	#[error("timed out waiting for layers to load: {pending:?}")]
	LoadTimeout { pending: Vec<Layer> },

	/// The unit event channel closed before every unit answered.
	#[error("unit event channel closed during startup")]
	EventsClosed,
}

/// Failure of a single lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
	/// The unit for `layer` did not reply within the dispatch timeout.
	#[error("search unit for layer {layer} did not reply in time")]
	Timeout { layer: Layer },

	/// The unit for `layer` has stopped accepting commands.
	#[error("search unit for layer {layer} is unavailable")]
	UnitUnavailable { layer: Layer },

	/// The configured cap on lookups in flight was reached.
	#[error("too many lookups in flight (limit {limit})")]
	Overloaded { limit: usize },

	/// The unit for `layer` failed while answering.
	#[error("search unit for layer {layer} failed: {message}")]
	UnitFailed { layer: Layer, message: String },

	/// The service shut down before the lookup resolved.
	#[error("reverse geocoder shut down")]
	ShutDown,
}
