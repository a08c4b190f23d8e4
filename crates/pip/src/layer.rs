//! Granularity layers and their canonical search order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownLayer;

/// One granularity level of administrative or geographic feature.
///
/// Declaration order is the search priority, finest first. `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
	Neighbourhood,
	Borough,
	Locality,
	Localadmin,
	County,
	Macrocounty,
	Macroregion,
	Region,
	Dependency,
	Country,
	Marinearea,
	Ocean,
}

impl Layer {
	/// Every layer in canonical (fine-to-coarse) order.
	pub const ALL: [Layer; 12] = [
		Layer::Neighbourhood,
		Layer::Borough,
		Layer::Locality,
		Layer::Localadmin,
		Layer::County,
		Layer::Macrocounty,
		Layer::Macroregion,
		Layer::Region,
		Layer::Dependency,
		Layer::Country,
		Layer::Marinearea,
		Layer::Ocean,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Neighbourhood => "neighbourhood",
			Self::Borough => "borough",
			Self::Locality => "locality",
			Self::Localadmin => "localadmin",
			Self::County => "county",
			Self::Macrocounty => "macrocounty",
			Self::Macroregion => "macroregion",
			Self::Region => "region",
			Self::Dependency => "dependency",
			Self::Country => "country",
			Self::Marinearea => "marinearea",
			Self::Ocean => "ocean",
		}
	}

	/// Position in the canonical order; 0 is the finest layer.
	pub const fn rank(self) -> usize {
		self as usize
	}

	/// Maps a hierarchy key such as `"country_id"` to its layer.
	pub fn from_ancestor_key(key: &str) -> Option<Self> {
		key.strip_suffix("_id").and_then(|name| name.parse().ok())
	}
}

impl fmt::Display for Layer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Layer {
	type Err = UnknownLayer;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let needle = s.trim();
		Self::ALL
			.into_iter()
			.find(|layer| layer.as_str().eq_ignore_ascii_case(needle))
			.ok_or_else(|| UnknownLayer(s.to_string()))
	}
}

/// Intersects `requested` with `available`, in canonical order, without duplicates.
///
/// `None` means "every available layer". `Some(&[])` selects nothing.
pub fn effective_layers(requested: Option<&[Layer]>, available: &[Layer]) -> Vec<Layer> {
	Layer::ALL
		.into_iter()
		.filter(|layer| available.contains(layer))
		.filter(|layer| requested.is_none_or(|req| req.contains(layer)))
		.collect()
}
