//! Messages exchanged between the coordinator and search units.
//!
//! | Direction | Message | Payload |
//! |---|---|---|
//! | coordinator → unit | [`UnitCommand::Load`] | layer, datapath, localized admin names flag |
//! | unit → coordinator | [`UnitEvent::Loaded`] | layer, elapsed time, every feature record of the layer |
//! | unit → coordinator | [`UnitEvent::LoadFailed`] | layer, error text |
//! | coordinator → unit | [`UnitCommand::Search`] | request id, coordinates |
//! | unit → coordinator | [`UnitEvent::Results`] | request id, layer, matched id or nothing |
//! | unit → coordinator | [`UnitEvent::SearchFailed`] | request id, layer, error text |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::coords::Coordinates;
use crate::dataset::{FeatureId, FeatureRecord};
use crate::layer::Layer;

/// Generation-checked identifier of one pending lookup.
///
/// `slot` is reused after a request resolves; `generation` is not, so a reply
/// carrying a stale id never matches the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId {
	pub(crate) generation: u64,
	pub(crate) slot: usize,
}

impl RequestId {
	pub const fn generation(self) -> u64 {
		self.generation
	}

	pub const fn slot(self) -> usize {
		self.slot
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.generation, self.slot)
	}
}

/// Instructs a unit to build its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
	pub layer: Layer,
	pub datapath: PathBuf,
	pub localized_admin_names: bool,
}

/// Coordinator to unit.
#[derive(Debug, Clone)]
pub enum UnitCommand {
	Load(LoadCommand),
	Search { request_id: RequestId, point: Coordinates },
}

/// Unit to coordinator.
#[derive(Debug, Clone)]
pub enum UnitEvent {
	Loaded {
		layer: Layer,
		elapsed: Duration,
		records: Vec<FeatureRecord>,
	},
	LoadFailed {
		layer: Layer,
		error: String,
	},
	Results {
		request_id: RequestId,
		layer: Layer,
		hit: Option<FeatureId>,
	},
	SearchFailed {
		request_id: RequestId,
		layer: Layer,
		error: String,
	},
}

impl UnitEvent {
	pub fn layer(&self) -> Layer {
		match self {
			Self::Loaded { layer, .. } | Self::LoadFailed { layer, .. } | Self::Results { layer, .. } | Self::SearchFailed { layer, .. } => *layer,
		}
	}
}
