//! Expansion of a matched feature into its full ancestor chain.
//!
//! Output order is fixed: ancestor types that name a [`Layer`] come first in
//! canonical order (finest first), then any other ancestor types (for example
//! `continent_id`) sorted by key.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::dataset::{FeatureDataset, FeatureRecord};
use crate::layer::Layer;

/// Resolves ancestor chains against a frozen dataset.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyAssembler<'a> {
	dataset: &'a FeatureDataset,
}

impl<'a> HierarchyAssembler<'a> {
	pub fn new(dataset: &'a FeatureDataset) -> Self {
		Self { dataset }
	}

	/// Returns the matched feature's ancestors (itself included when its
	/// hierarchy lists it), or just the feature when it has no hierarchy.
	///
	/// Only the first hierarchy mapping is used. Unknown ids yield an empty list.
	pub fn resolve(&self, id: &str) -> Vec<Arc<FeatureRecord>> {
		let Some(record) = self.dataset.get(id) else {
			tracing::debug!(id, "pip.hierarchy.unknown_feature");
			return Vec::new();
		};

		let Some(ancestors) = record.hierarchy.first() else {
			return vec![Arc::clone(record)];
		};

		let mut entries: Vec<_> = ancestors.iter().collect();
		entries.sort_by(|(a, _), (b, _)| ancestor_order(a, b));

		entries
			.into_iter()
			.filter_map(|(kind, ancestor)| {
				let found = self.dataset.get(ancestor.as_str()).cloned();
				if found.is_none() {
					tracing::trace!(id, kind = %kind, ancestor = %ancestor, "pip.hierarchy.absent_ancestor");
				}
				found
			})
			.collect()
	}
}

fn ancestor_order(a: &str, b: &str) -> Ordering {
	match (Layer::from_ancestor_key(a), Layer::from_ancestor_key(b)) {
		(Some(x), Some(y)) => x.cmp(&y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => a.cmp(b),
	}
}
