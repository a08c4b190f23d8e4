use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strata_pip::{FeatureId, Layer};

use crate::PostalError;

/// One administrative feature a postal code may belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCandidate {
	pub id: FeatureId,
	pub name: String,
	pub layer: Layer,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub abbreviation: Option<String>,
}

/// Uppercases and trims a country code.
pub fn normalize_country(code: &str) -> String {
	code.trim().to_uppercase()
}

/// Uppercases a postal code and strips whitespace and hyphens, so
/// `"sw1a 1aa"` and `"SW1A-1AA"` both become `"SW1A1AA"`.
pub fn normalize_code(code: &str) -> String {
	code.chars()
		.filter(|c| !c.is_whitespace() && *c != '-')
		.flat_map(char::to_uppercase)
		.collect()
}

type RawTable = BTreeMap<String, BTreeMap<String, Vec<PostalCandidate>>>;

/// Country code to postal code to ordered candidates. Immutable once loaded.
#[derive(Debug, Default)]
pub struct PostalTable {
	countries: FxHashMap<String, FxHashMap<String, Vec<PostalCandidate>>>,
}

impl PostalTable {
	/// Reads a table from a JSON file.
	pub fn load(path: &Path) -> Result<Self, PostalError> {
		let text = std::fs::read_to_string(path).map_err(|source| PostalError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let table = Self::from_json_str(&text)?;
		tracing::info!(path = %path.display(), countries = table.countries.len(), codes = table.len(), "postal.table.loaded");
		Ok(table)
	}

	/// Parses a table. Codes that normalise to the same key have their
	/// candidate lists concatenated in file order.
	pub fn from_json_str(text: &str) -> Result<Self, PostalError> {
		let raw: RawTable = serde_json::from_str(text)?;
		let mut countries: FxHashMap<String, FxHashMap<String, Vec<PostalCandidate>>> = FxHashMap::default();

		for (country, codes) in raw {
			let country = normalize_country(&country);
			if country.is_empty() {
				return Err(PostalError::EmptyKey { kind: "country" });
			}
			let entries = countries.entry(country).or_default();
			for (code, candidates) in codes {
				let key = normalize_code(&code);
				if key.is_empty() {
					return Err(PostalError::EmptyKey { kind: "postal" });
				}
				let slot = entries.entry(key).or_default();
				if !slot.is_empty() {
					tracing::debug!(code = %code, "postal.table.merged_code");
				}
				slot.extend(candidates);
			}
		}

		Ok(Self { countries })
	}

	/// Candidates for `code` in `country`, in table order.
	pub fn lookup(&self, country: &str, code: &str) -> Option<&[PostalCandidate]> {
		self.countries
			.get(&normalize_country(country))?
			.get(&normalize_code(code))
			.map(Vec::as_slice)
	}

	/// Number of postal codes across every country.
	pub fn len(&self) -> usize {
		self.countries.values().map(FxHashMap::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
