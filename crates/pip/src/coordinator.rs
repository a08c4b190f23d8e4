//! The cascade coordinator task.
//!
//! Sole owner of the pending request table. Reacts to three inputs: lookup
//! commands from service handles, unit events, and the earliest dispatch
//! deadline. Each handler runs to completion before the next input is taken,
//! so lookup state never needs a lock.
//!
//! A search that finds its unit's mailbox full is parked in a per-layer
//! backlog with its deadline stopped. Every reply from that unit frees a
//! mailbox slot, so the backlog is drained as replies arrive.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::coords::Coordinates;
use crate::dataset::{FeatureDataset, FeatureId};
use crate::error::LookupError;
use crate::hierarchy::HierarchyAssembler;
use crate::layer::{Layer, effective_layers};
use crate::pending::{Advance, Completion, PendingRequest, PendingRequestTable, Settle};
use crate::pool::SearchUnitPool;
use crate::protocol::{RequestId, UnitCommand, UnitEvent};
use crate::service::LookupResult;
use crate::unit::DispatchError;

/// Requests accepted by the coordinator.
#[derive(Debug)]
pub(crate) enum Command {
	Lookup {
		point: Coordinates,
		/// `None` searches every active layer.
		layers: Option<Vec<Layer>>,
		reply: Completion,
	},
}

pub(crate) struct CascadeCoordinator {
	pool: SearchUnitPool,
	dataset: Arc<FeatureDataset>,
	pending: PendingRequestTable,
	/// Searches waiting for mailbox room, oldest first.
	backlog: FxHashMap<Layer, VecDeque<RequestId>>,
	dispatch_timeout: Duration,
	max_pending: Option<usize>,
}

impl CascadeCoordinator {
	pub(crate) fn new(pool: SearchUnitPool, dataset: Arc<FeatureDataset>, dispatch_timeout: Duration, max_pending: Option<usize>) -> Self {
		Self {
			pool,
			dataset,
			pending: PendingRequestTable::new(),
			backlog: FxHashMap::default(),
			dispatch_timeout,
			max_pending,
		}
	}

	/// Event loop. Exits on cancellation or once every service handle is gone,
	/// then drops all pending completions and shuts the pool down.
	pub(crate) async fn run(
		mut self,
		mut commands: mpsc::Receiver<Command>,
		mut events: mpsc::UnboundedReceiver<UnitEvent>,
		cancel: CancellationToken,
	) {
		tracing::debug!(layers = ?self.pool.layers(), "pip.coordinator.start");

		loop {
			let deadline = self.pending.next_deadline();
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				Some(event) = events.recv() => self.on_event(event),
				cmd = commands.recv() => {
					let Some(cmd) = cmd else {
						break;
					};
					self.on_command(cmd);
				}
				_ = sleep_until(deadline) => self.on_deadline(Instant::now()),
			}
		}

		self.backlog.clear();
		let abandoned = self.pending.abandon_all();
		tracing::info!(abandoned, "pip.coordinator.stopped");
		self.pool.shutdown().await;
	}

	fn on_command(&mut self, cmd: Command) {
		match cmd {
			Command::Lookup { point, layers, reply } => self.on_lookup(point, layers.as_deref(), reply),
		}
	}

	pub(crate) fn on_lookup(&mut self, point: Coordinates, layers: Option<&[Layer]>, reply: Completion) {
		let layers = effective_layers(layers, self.pool.layers());
		if layers.is_empty() {
			let _ = reply.send(Ok(Vec::new()));
			return;
		}
		if let Some(limit) = self.max_pending
			&& self.pending.len() >= limit
		{
			tracing::warn!(limit, "pip.cascade.overloaded");
			let _ = reply.send(Err(LookupError::Overloaded { limit }));
			return;
		}
		let id = self.pending.insert(point, layers, reply);
		tracing::trace!(request = %id, lat = point.lat, lon = point.lon, "pip.cascade.start");
		self.advance(id);
	}

	fn advance(&mut self, id: RequestId) {
		if self.pending.get(id).is_some_and(PendingRequest::is_abandoned) {
			self.pending.remove(id);
			tracing::debug!(request = %id, "pip.cascade.abandoned");
			return;
		}

		match self.pending.advance(id, self.deadline()) {
			None => {}
			Some(Advance::InFlight(layer)) => {
				tracing::trace!(request = %id, %layer, "pip.cascade.already_in_flight");
			}
			Some(Advance::Exhausted) => self.resolve(id, Ok(Vec::new())),
			Some(Advance::Dispatch { layer, point }) => {
				if self.backlog.get(&layer).is_some_and(|queue| !queue.is_empty()) {
					self.park(id, layer);
					return;
				}
				match self.pool.dispatch(layer, UnitCommand::Search { request_id: id, point }) {
					Ok(()) => tracing::trace!(request = %id, %layer, "pip.cascade.dispatch"),
					Err(DispatchError::Full) => self.park(id, layer),
					Err(DispatchError::Closed) => {
						tracing::warn!(request = %id, %layer, "pip.cascade.unit_unavailable");
						self.resolve(id, Err(LookupError::UnitUnavailable { layer }));
					}
				}
			}
		}
	}

	/// Deadline for a search sent now. A timeout too large to represent means none.
	fn deadline(&self) -> Option<Instant> {
		Instant::now().checked_add(self.dispatch_timeout)
	}

	/// Stops the deadline of `id`'s dispatch to `layer` and queues it behind the mailbox.
	fn park(&mut self, id: RequestId, layer: Layer) {
		self.pending.rearm(id, None);
		let queue = self.backlog.entry(layer).or_default();
		queue.push_back(id);
		tracing::debug!(request = %id, %layer, backlog = queue.len(), "pip.cascade.parked");
	}

	/// Sends parked searches for `layer` until its mailbox is full again.
	pub(crate) fn drain_backlog(&mut self, layer: Layer) {
		let Some(mut queue) = self.backlog.remove(&layer) else {
			return;
		};
		while let Some(&id) = queue.front() {
			let Some(request) = self.pending.get(id).filter(|request| request.in_flight() == Some(layer)) else {
				queue.pop_front();
				continue;
			};
			if request.is_abandoned() {
				queue.pop_front();
				self.pending.remove(id);
				tracing::debug!(request = %id, "pip.cascade.abandoned");
				continue;
			}
			let point = request.point();
			match self.pool.dispatch(layer, UnitCommand::Search { request_id: id, point }) {
				Ok(()) => {
					queue.pop_front();
					self.pending.rearm(id, self.deadline());
					tracing::trace!(request = %id, %layer, "pip.cascade.dispatch");
				}
				Err(DispatchError::Full) => break,
				Err(DispatchError::Closed) => {
					tracing::warn!(%layer, parked = queue.len(), "pip.cascade.unit_unavailable");
					for id in queue.drain(..) {
						if self.pending.get(id).is_some_and(|request| request.in_flight() == Some(layer)) {
							self.resolve(id, Err(LookupError::UnitUnavailable { layer }));
						}
					}
				}
			}
		}
		if !queue.is_empty() {
			self.backlog.insert(layer, queue);
		}
	}

	pub(crate) fn on_event(&mut self, event: UnitEvent) {
		match event {
			UnitEvent::Results { request_id, layer, hit } => {
				self.on_results(request_id, layer, hit);
				self.drain_backlog(layer);
			}
			UnitEvent::SearchFailed { request_id, layer, error } => {
				if self.accept(request_id, layer) {
					tracing::warn!(request = %request_id, %layer, %error, "pip.cascade.search_failed");
					self.resolve(request_id, Err(LookupError::UnitFailed { layer, message: error }));
				}
				self.drain_backlog(layer);
			}
			UnitEvent::Loaded { layer, .. } | UnitEvent::LoadFailed { layer, .. } => {
				tracing::warn!(%layer, "pip.coordinator.late_load_event");
			}
		}
	}

	pub(crate) fn on_results(&mut self, id: RequestId, layer: Layer, hit: Option<FeatureId>) {
		if !self.accept(id, layer) {
			return;
		}
		match hit {
			Some(feature) => {
				let chain = HierarchyAssembler::new(&self.dataset).resolve(feature.as_str());
				tracing::trace!(request = %id, %layer, feature = %feature, ancestors = chain.len(), "pip.cascade.hit");
				self.resolve(id, Ok(chain));
			}
			None => self.advance(id),
		}
	}

	/// Settles the in-flight dispatch of `id`. False means the reply was discarded.
	fn accept(&mut self, id: RequestId, layer: Layer) -> bool {
		match self.pending.settle(id, layer) {
			Settle::Accepted => true,
			Settle::Unknown => {
				tracing::warn!(request = %id, %layer, "pip.cascade.discard");
				false
			}
			Settle::Unexpected { in_flight } => {
				tracing::warn!(request = %id, %layer, in_flight = ?in_flight, "pip.cascade.unexpected_reply");
				false
			}
		}
	}

	pub(crate) fn on_deadline(&mut self, now: Instant) {
		for (id, layer, request) in self.pending.take_expired(now) {
			tracing::warn!(request = %id, %layer, "pip.cascade.timeout");
			if !request.complete(Err(LookupError::Timeout { layer })) {
				tracing::debug!(request = %id, "pip.cascade.caller_gone");
			}
		}
	}

	fn resolve(&mut self, id: RequestId, result: LookupResult) {
		let Some(request) = self.pending.remove(id) else {
			return;
		};
		if !request.complete(result) {
			tracing::debug!(request = %id, "pip.cascade.caller_gone");
		}
	}
}

async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}
