//! Feature records and the merged, startup-only dataset.
//!
//! Units hand their records over once, in their `Loaded` event. The pool feeds
//! each contribution into a [`DatasetBuilder`] as it arrives and freezes the
//! result into a shared [`FeatureDataset`] before the first lookup.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::coords::{BoundingBox, Coordinates};
use crate::layer::Layer;

/// Opaque feature identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub String);

impl FeatureId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for FeatureId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for FeatureId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for FeatureId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for FeatureId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// One ancestor chain: ancestor type (`"country_id"`, `"region_id"`, ...) to identifier.
pub type AncestorMap = BTreeMap<String, FeatureId>;

/// Descriptive fields carried alongside a feature. Never interpreted by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
	pub name: String,
	pub placetype: Layer,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub abbreviation: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub centroid: Option<Coordinates>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bbox: Option<BoundingBox>,
}

/// A feature without its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
	pub id: FeatureId,
	/// Ancestor chains; empty for top-level features such as oceans.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub hierarchy: Vec<AncestorMap>,
	pub metadata: FeatureMetadata,
}

/// Append-only accumulator used while units are loading.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
	records: FxHashMap<FeatureId, Arc<FeatureRecord>>,
	contributions: Vec<Layer>,
}

impl DatasetBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merges one unit's contribution. Returns the number of new records.
	///
	/// An id already present keeps its first record.
	pub fn merge(&mut self, layer: Layer, records: Vec<FeatureRecord>) -> usize {
		let mut added = 0usize;
		for record in records {
			if self.records.contains_key(&record.id) {
				tracing::debug!(%layer, id = %record.id, "pip.dataset.duplicate");
				continue;
			}
			self.records.insert(record.id.clone(), Arc::new(record));
			added += 1;
		}
		self.contributions.push(layer);
		added
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Ends the loading phase.
	pub fn freeze(self) -> Arc<FeatureDataset> {
		Arc::new(FeatureDataset {
			records: self.records,
			contributions: self.contributions,
		})
	}
}

/// Frozen union of every unit's records.
#[derive(Debug, Default)]
pub struct FeatureDataset {
	records: FxHashMap<FeatureId, Arc<FeatureRecord>>,
	contributions: Vec<Layer>,
}

impl FeatureDataset {
	pub fn get(&self, id: &str) -> Option<&Arc<FeatureRecord>> {
		self.records.get(id)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.records.contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Layers that contributed records, in arrival order.
	pub fn contributions(&self) -> &[Layer] {
		&self.contributions
	}
}
