use std::path::PathBuf;

use thiserror::Error;

/// Failure loading a postal-code table.
#[derive(Debug, Error)]
pub enum PostalError {
	#[error("I/O error reading {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("malformed postal table: {0}")]
	Json(#[from] serde_json::Error),

	/// A key normalised to nothing.
	#[error("empty {kind} code in postal table")]
	EmptyKey { kind: &'static str },
}
