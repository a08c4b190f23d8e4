//! `strata.toml` loading.
//!
//! Every field is optional. Durations are whole milliseconds.
//!
//! ```toml
//! datapath = "/srv/wof"
//! layers = ["locality", "region", "country"]
//! localized_admin_names = true
//! dispatch_timeout_ms = 5000
//! load_timeout_ms = 120000
//! mailbox_capacity = 1024
//! max_pending_requests = 100000
//! postal_table = "/srv/wof/postal.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use strata_pip::{GeocoderOptions, Layer, PoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {}: {source}", path.display())]
	Toml {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid config value: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Directory holding `<layer>.geojson` files.
	pub datapath: PathBuf,
	/// Layers to load; empty loads every layer.
	pub layers: Vec<Layer>,
	pub localized_admin_names: bool,
	pub dispatch_timeout_ms: u64,
	pub load_timeout_ms: Option<u64>,
	pub mailbox_capacity: usize,
	/// Lookups allowed in flight at once; unset admits any number.
	pub max_pending_requests: Option<usize>,
	pub postal_table: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			datapath: PathBuf::from("data"),
			layers: Vec::new(),
			localized_admin_names: false,
			dispatch_timeout_ms: 5_000,
			load_timeout_ms: None,
			mailbox_capacity: 1024,
			max_pending_requests: None,
			postal_table: None,
		}
	}
}

impl Config {
	/// Loads `explicit` if given (it must exist), else the default path if it
	/// exists, else the built-in defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
		match explicit {
			Some(path) => Self::from_file(path),
			None => match default_path() {
				Some(path) if path.is_file() => Self::from_file(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let config = Self::from_toml_str(&text).map_err(|err| match err {
			ConfigError::Toml { source, .. } => ConfigError::Toml {
				path: path.to_path_buf(),
				source,
			},
			other => other,
		})?;
		tracing::debug!(path = %path.display(), "strata.config.loaded");
		Ok(config)
	}

	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text).map_err(|source| ConfigError::Toml {
			path: PathBuf::from("<inline>"),
			source,
		})?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.mailbox_capacity == 0 {
			return Err(ConfigError::Invalid("mailbox_capacity must be > 0".into()));
		}
		if self.dispatch_timeout_ms == 0 {
			return Err(ConfigError::Invalid("dispatch_timeout_ms must be > 0".into()));
		}
		if self.max_pending_requests == Some(0) {
			return Err(ConfigError::Invalid("max_pending_requests must be > 0".into()));
		}
		Ok(())
	}

	pub fn geocoder_options(&self) -> GeocoderOptions {
		let pool = PoolOptions::new(&self.datapath)
			.layers(self.layers.iter().copied())
			.localized_admin_names(self.localized_admin_names)
			.mailbox_capacity(self.mailbox_capacity)
			.load_timeout(self.load_timeout_ms.map(Duration::from_millis));
		GeocoderOptions::new(pool)
			.dispatch_timeout(Duration::from_millis(self.dispatch_timeout_ms))
			.max_pending(self.max_pending_requests)
	}
}

/// `strata/strata.toml` under the platform config directory
/// (`$XDG_CONFIG_HOME` or `~/.config` on Linux).
fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("strata").join("strata.toml"))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_file_is_all_defaults() {
		assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
	}

	#[test]
	fn fields_are_read() {
		let config = Config::from_toml_str(
			r#"
			datapath = "/srv/wof"
			layers = ["country", "locality"]
			localized_admin_names = true
			dispatch_timeout_ms = 250
			load_timeout_ms = 60000
			max_pending_requests = 500
			postal_table = "/srv/postal.json"
			"#,
		)
		.unwrap();

		assert_eq!(config.datapath, PathBuf::from("/srv/wof"));
		assert_eq!(config.layers, vec![Layer::Country, Layer::Locality]);
		assert!(config.localized_admin_names);

		let options = config.geocoder_options();
		assert_eq!(options.dispatch_timeout, Duration::from_millis(250));
		assert_eq!(options.pool.load_timeout, Some(Duration::from_secs(60)));
		assert!(options.pool.localized_admin_names);
		assert_eq!(options.pool.mailbox_capacity, 1024);
		assert_eq!(options.max_pending, Some(500));
	}

	#[test]
	fn unknown_layer_is_rejected() {
		let err = Config::from_toml_str(r#"layers = ["galaxy"]"#).unwrap_err();
		assert!(matches!(err, ConfigError::Toml { .. }), "{err}");
	}

	#[test]
	fn unknown_field_is_rejected() {
		assert!(Config::from_toml_str("datapth = \"x\"").is_err());
	}

	#[test]
	fn zero_capacity_is_invalid() {
		let err = Config::from_toml_str("mailbox_capacity = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
	}

	#[test]
	fn zero_pending_cap_is_invalid() {
		let err = Config::from_toml_str("max_pending_requests = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
	}

	#[test]
	fn huge_dispatch_timeout_is_accepted() {
		let config = Config::from_toml_str(&format!("dispatch_timeout_ms = {}", i64::MAX)).unwrap();
		assert_eq!(config.geocoder_options().dispatch_timeout, Duration::from_millis(i64::MAX as u64));
	}

	#[test]
	fn explicit_path_must_exist() {
		let dir = tempfile::tempdir().unwrap();
		let err = Config::load(Some(&dir.path().join("strata.toml"))).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }), "{err}");
	}

	#[test]
	fn file_errors_name_the_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("strata.toml");
		std::fs::write(&path, "layers = 3").unwrap();

		let err = Config::from_file(&path).unwrap_err();
		assert!(err.to_string().contains("strata.toml"), "{err}");
	}
}
