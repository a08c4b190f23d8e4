#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Layer-partitioned point-in-polygon lookups.
//!
//! # Purpose
//!
//! - Answer "which administrative features contain this coordinate" by cascading one query through per-layer search units, finest layer first.
//! - Own the search unit lifecycle: spawn and load one unit per layer, merge each unit's records into a shared dataset, tear everything down on shutdown.
//! - Correlate unit replies with in-flight lookups and assemble the full ancestor chain of the first matching feature.
//! - Exclude geometry: containment tests live behind [`PointIndex`] and are provided by a [`LayerSource`] (see `strata-index`).
//!
//! # Mental model
//!
//! - Each [`Layer`] gets exactly one search unit: a task that exclusively owns that layer's index and answers `Search` commands from its mailbox.
//! - Units hand their feature records (without geometry) to the coordinator once at load time; the merged [`FeatureDataset`] is frozen before any lookup runs.
//! - A single coordinator task owns the [`PendingRequestTable`] and is the only mutator of lookup state. Everything it does is driven by message arrival or a dispatch deadline firing.
//! - A lookup walks its layer queue one dispatch at a time. The first hit ends the cascade because the matched feature already carries its ancestors.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`Layer`] | Granularity level | Declaration order MUST be the fine-to-coarse search order | `layer::effective_layers` |
//! | [`FeatureRecord`] | One feature without geometry | Immutable after load | `LayerSource::load` |
//! | [`DatasetBuilder`] | Startup-only dataset accumulator | MUST only be touched before the pool reports ready | `SearchUnitPool::create` |
//! | [`FeatureDataset`] | Frozen id to record map | Read-only once frozen | `DatasetBuilder::freeze` |
//! | [`RequestId`] | Generation-checked pending slot id | MUST NOT match a request after it resolves | `PendingRequestTable::insert` |
//! | [`PendingRequestTable`] | In-flight lookup registry | At most one dispatch in flight per request | `CascadeCoordinator::*` |
//! | [`SearchUnitPool`] | Unit directory and lifecycle | One unit per active layer | `SearchUnitPool::create`, `SearchUnitPool::shutdown` |
//! | [`ReverseGeocoder`] | Public service handle | Dropping it cancels the coordinator and every unit | `ReverseGeocoder::create` |
//!
//! # Invariants
//!
//! 1. Layers MUST be searched in canonical order regardless of the order a caller lists them.
//!    - Enforced in: `layer::effective_layers`
//!    - Tested by: `layer::tests::caller_order_is_ignored`, `cascade::requested_layers_follow_canonical_order`
//!    - Failure symptom: a country match shadows the neighbourhood that actually contains the point.
//!
//! 2. A request MUST have at most one search dispatch in flight, and a layer leaves the queue when it is dispatched.
//!    - Enforced in: `PendingRequestTable::advance`, `PendingRequestTable::settle`
//!    - Tested by: `pending::tests::advance_refuses_while_in_flight`, `cascade::cascade_never_skips_ahead_under_concurrency`
//!    - Failure symptom: duplicate replies for one request, or a coarse hit racing a fine hit.
//!
//! 3. The cascade MUST stop at the first hit.
//!    - Enforced in: `CascadeCoordinator::on_results`
//!    - Tested by: `cascade::first_hit_stops_the_cascade`
//!    - Failure symptom: coarser units do redundant work for every lookup.
//!
//! 4. Replies for unknown or already-resolved request ids MUST be discarded without touching state.
//!    - Enforced in: `PendingRequestTable::settle`
//!    - Tested by: `pending::tests::stale_generation_is_unknown`, `coordinator::tests::unknown_reply_is_discarded`
//!    - Failure symptom: a late reply completes an unrelated lookup that reused the slot.
//!
//! 5. A lookup with an empty effective layer set MUST resolve immediately without contacting any unit.
//!    - Enforced in: `CascadeCoordinator::on_lookup`
//!    - Tested by: `cascade::empty_layer_set_contacts_no_unit`, `cascade::no_loaded_layers_always_resolves_empty`
//!    - Failure symptom: lookups hang waiting on units that were never asked.
//!
//! 6. Every search handed to a unit mailbox MUST be bounded by the dispatch timeout.
//!    - Enforced in: `PendingRequestTable::take_expired`, `CascadeCoordinator::on_deadline`
//!    - Tested by: `cascade::silent_unit_times_out`
//!    - Failure symptom: a wedged unit leaks pending entries and callers wait forever.
//!
//! 7. Hierarchy assembly MUST be deterministic and MUST drop ancestors missing from the dataset.
//!    - Enforced in: `HierarchyAssembler::resolve`
//!    - Tested by: `hierarchy::tests::resolve_is_idempotent`, `hierarchy::tests::absent_ancestors_are_dropped`
//!    - Failure symptom: consumers reading results positionally see layers shuffle between runs.
//!
//! 8. A full unit mailbox MUST NOT fail a lookup; searches parked for a layer go out in arrival order.
//!    - Enforced in: `CascadeCoordinator::advance`, `CascadeCoordinator::drain_backlog`
//!    - Tested by: `coordinator::tests::full_mailbox_parks_searches_in_order`, `cascade::lookups_beyond_mailbox_capacity_all_resolve`
//!    - Failure symptom: bursts larger than the mailbox fail valid lookups.
//!
//! # Failure modes & recovery
//!
//! - Layer data missing at startup: the unit answers `LoadFailed`, is torn down, and the layer is left out of the active set.
//! - Unit stops answering: the dispatch deadline resolves the lookup with [`LookupError::Timeout`]; the late reply is discarded.
//! - Unit mailbox full: the search is parked in a per-layer backlog and sent, with a fresh deadline, as the unit replies.
//! - Unit mailbox closed: the lookup (and every search parked for that layer) resolves with [`LookupError::UnitUnavailable`].
//! - Optional cap on lookups in flight reached: new lookups resolve with [`LookupError::Overloaded`].
//! - Shutdown: pending completions are dropped; waiting callers observe [`LookupError::ShutDown`].

mod coordinator;
pub mod coords;
pub mod dataset;
pub mod error;
pub mod hierarchy;
pub mod layer;
pub mod pending;
pub mod pool;
pub mod protocol;
mod service;
mod task;
#[cfg(test)]
mod testing;
pub mod unit;

pub use coords::{BoundingBox, Coordinates};
pub use dataset::{AncestorMap, DatasetBuilder, FeatureDataset, FeatureId, FeatureMetadata, FeatureRecord};
pub use error::{CoordinateError, LoadError, LookupError, PoolError, UnknownLayer};
pub use hierarchy::HierarchyAssembler;
pub use layer::{Layer, effective_layers};
pub use pending::PendingRequestTable;
pub use pool::{PoolOptions, SearchUnitPool, StartedPool};
pub use protocol::{LoadCommand, RequestId, UnitCommand, UnitEvent};
pub use service::{GeocoderOptions, LookupResult, ReverseGeocoder};
pub use unit::{LayerSource, LoadedLayer, PointIndex};
