//! Registry of in-flight lookups.
//!
//! Owned exclusively by the coordinator task. Each entry tracks the layers
//! still to be searched, the single dispatch currently in flight with its
//! deadline, and the completion channel of the waiting caller. A dispatch
//! without a deadline never expires; the coordinator uses that for searches
//! parked behind a full unit mailbox.

use std::collections::{BTreeSet, VecDeque};

use slab::Slab;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::coords::Coordinates;
use crate::layer::Layer;
use crate::protocol::RequestId;
use crate::service::LookupResult;

/// Completion side of one lookup.
pub type Completion = oneshot::Sender<LookupResult>;

/// One in-flight lookup.
#[derive(Debug)]
pub struct PendingRequest {
	point: Coordinates,
	queue: VecDeque<Layer>,
	in_flight: Option<InFlight>,
	completion: Completion,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
	layer: Layer,
	deadline: Option<Instant>,
}

impl PendingRequest {
	pub fn point(&self) -> Coordinates {
		self.point
	}

	/// Layers not yet dispatched, in dispatch order.
	pub fn remaining(&self) -> impl Iterator<Item = Layer> + '_ {
		self.queue.iter().copied()
	}

	pub fn in_flight(&self) -> Option<Layer> {
		self.in_flight.map(|f| f.layer)
	}

	/// True once the caller stopped waiting for the result.
	pub fn is_abandoned(&self) -> bool {
		self.completion.is_closed()
	}

	/// Delivers the result. Returns false if the caller is gone.
	pub fn complete(self, result: LookupResult) -> bool {
		self.completion.send(result).is_ok()
	}
}

/// Outcome of [`PendingRequestTable::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
	/// `layer` was popped and is now in flight.
	Dispatch { layer: Layer, point: Coordinates },
	/// Every layer has been searched without a hit.
	Exhausted,
	/// A dispatch is already outstanding; nothing changed.
	InFlight(Layer),
}

/// Outcome of [`PendingRequestTable::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
	/// The reply matches the dispatch in flight, which is now cleared.
	Accepted,
	/// No live request has this id.
	Unknown,
	/// The request exists but is not waiting on this layer.
	Unexpected { in_flight: Option<Layer> },
}

#[derive(Debug)]
struct Slot {
	generation: u64,
	request: PendingRequest,
}

/// Slot table keyed by generation-checked [`RequestId`]s.
#[derive(Debug, Default)]
pub struct PendingRequestTable {
	slots: Slab<Slot>,
	deadlines: BTreeSet<(Instant, RequestId)>,
	next_generation: u64,
}

impl PendingRequestTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Registers a lookup over `layers` (already in dispatch order).
	pub fn insert(&mut self, point: Coordinates, layers: impl IntoIterator<Item = Layer>, completion: Completion) -> RequestId {
		let generation = self.next_generation;
		self.next_generation += 1;
		let entry = self.slots.vacant_entry();
		let id = RequestId {
			generation,
			slot: entry.key(),
		};
		entry.insert(Slot {
			generation,
			request: PendingRequest {
				point,
				queue: layers.into_iter().collect(),
				in_flight: None,
				completion,
			},
		});
		id
	}

	pub fn get(&self, id: RequestId) -> Option<&PendingRequest> {
		self.slots
			.get(id.slot)
			.filter(|slot| slot.generation == id.generation)
			.map(|slot| &slot.request)
	}

	fn get_mut(&mut self, id: RequestId) -> Option<&mut PendingRequest> {
		self.slots
			.get_mut(id.slot)
			.filter(|slot| slot.generation == id.generation)
			.map(|slot| &mut slot.request)
	}

	/// Pops the next layer and marks it in flight until `deadline`.
	///
	/// Returns `None` for unknown ids.
	pub fn advance(&mut self, id: RequestId, deadline: Option<Instant>) -> Option<Advance> {
		let request = self.get_mut(id)?;
		if let Some(flight) = request.in_flight {
			return Some(Advance::InFlight(flight.layer));
		}
		let Some(layer) = request.queue.pop_front() else {
			return Some(Advance::Exhausted);
		};
		request.in_flight = Some(InFlight { layer, deadline });
		let point = request.point;
		if let Some(deadline) = deadline {
			self.deadlines.insert((deadline, id));
		}
		Some(Advance::Dispatch { layer, point })
	}

	/// Replaces the deadline of the dispatch in flight for `id`.
	///
	/// `None` stops the clock. Returns false if nothing is in flight.
	pub fn rearm(&mut self, id: RequestId, deadline: Option<Instant>) -> bool {
		let Some(flight) = self.get_mut(id).and_then(|request| request.in_flight.as_mut()) else {
			return false;
		};
		let previous = std::mem::replace(&mut flight.deadline, deadline);
		if let Some(previous) = previous {
			self.deadlines.remove(&(previous, id));
		}
		if let Some(deadline) = deadline {
			self.deadlines.insert((deadline, id));
		}
		true
	}

	/// Accepts a reply from `layer` for `id`, clearing the in-flight dispatch.
	pub fn settle(&mut self, id: RequestId, layer: Layer) -> Settle {
		let Some(request) = self.get_mut(id) else {
			return Settle::Unknown;
		};
		match request.in_flight {
			Some(flight) if flight.layer == layer => {
				request.in_flight = None;
				if let Some(deadline) = flight.deadline {
					self.deadlines.remove(&(deadline, id));
				}
				Settle::Accepted
			}
			other => Settle::Unexpected {
				in_flight: other.map(|f| f.layer),
			},
		}
	}

	/// Removes a request, returning it for completion.
	pub fn remove(&mut self, id: RequestId) -> Option<PendingRequest> {
		self.get(id)?;
		let slot = self.slots.remove(id.slot);
		if let Some(deadline) = slot.request.in_flight.and_then(|flight| flight.deadline) {
			self.deadlines.remove(&(deadline, id));
		}
		Some(slot.request)
	}

	/// Earliest outstanding dispatch deadline.
	pub fn next_deadline(&self) -> Option<Instant> {
		self.deadlines.first().map(|(deadline, _)| *deadline)
	}

	/// Removes every request whose dispatch deadline is at or before `now`.
	pub fn take_expired(&mut self, now: Instant) -> Vec<(RequestId, Layer, PendingRequest)> {
		let mut expired = Vec::new();
		while let Some(&(deadline, id)) = self.deadlines.first() {
			if deadline > now {
				break;
			}
			self.deadlines.pop_first();
			let slot = self.slots.remove(id.slot);
			if let Some(flight) = slot.request.in_flight {
				expired.push((id, flight.layer, slot.request));
			}
		}
		expired
	}

	/// Drops every request without completing it. Returns how many were abandoned.
	pub fn abandon_all(&mut self) -> usize {
		let count = self.slots.len();
		self.slots.clear();
		self.deadlines.clear();
		count
	}
}
