use std::future::Future;

use tokio::task::JoinHandle;

/// Role of a spawned task, recorded on every spawn for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskRole {
	/// The cascade coordinator loop.
	Coordinator,
	/// One layer's search unit mailbox loop.
	Unit,
	/// Index construction for one layer.
	IndexBuild,
	/// One containment query.
	Query,
	/// Callback delivery for `lookup_with`.
	Callback,
}

impl TaskRole {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Coordinator => "coordinator",
			Self::Unit => "unit",
			Self::IndexBuild => "index_build",
			Self::Query => "query",
			Self::Callback => "callback",
		}
	}
}

/// Spawns an async task on the current runtime.
pub(crate) fn spawn<F>(role: TaskRole, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(task_role = role.as_str(), "pip.spawn");
	tokio::spawn(fut)
}

/// Spawns blocking work on the runtime's blocking pool.
pub(crate) fn spawn_blocking<F, R>(role: TaskRole, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(task_role = role.as_str(), "pip.spawn_blocking");
	tokio::task::spawn_blocking(f)
}

/// Extracts the panic message from a failed join, if it was a panic.
pub(crate) fn join_error_message(err: tokio::task::JoinError) -> String {
	if !err.is_panic() {
		return err.to_string();
	}
	let payload = err.into_panic();
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"task panicked".to_string()
	}
}
