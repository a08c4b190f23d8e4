#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Layer loading for strata search units.
//!
//! [`GeoJsonSource`] reads `<datapath>/<layer>.geojson`, a GeoJSON
//! FeatureCollection of Who's On First features, and produces a
//! [`PolygonIndex`] plus the layer's feature records.
//!
//! | Stage | Module | Output |
//! |---|---|---|
//! | Decode features one by one, filter retired ones | `wof` | [`WofLayer`] |
//! | Convert geometry, rank by area, R-tree of bounding boxes | `geometry` | [`PolygonIndex`] |
//! | File lookup and error mapping | `source` | [`strata_pip::LoadedLayer`] |

mod error;
pub mod geometry;
mod source;
pub mod wof;

pub use error::IndexError;
pub use geometry::PolygonIndex;
pub use source::GeoJsonSource;
pub use wof::{WofLayer, parse_layer};
