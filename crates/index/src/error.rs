use thiserror::Error;

/// Failure decoding a layer file.
#[derive(Debug, Error)]
pub enum IndexError {
	/// The file is not a GeoJSON FeatureCollection.
	#[error("malformed feature collection: {0}")]
	Collection(#[from] serde_json::Error),

	/// One feature's geometry could not be converted. Only that feature is skipped.
	#[error("feature {id}: invalid {kind} geometry: {message}")]
	Geometry { id: String, kind: String, message: String },
}
