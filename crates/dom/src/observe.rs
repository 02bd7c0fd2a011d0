use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use crate::node::{Node, NodeInner};

/// One batch of direct child-list edits on an observed node.
#[derive(Debug, Clone)]
pub struct ChildListChange {
	/// Nodes appended by this edit.
	pub added: Vec<Node>,
	/// Nodes removed by this edit.
	pub removed: Vec<Node>,
}

/// Deprecated synchronous mutation callback.
pub(crate) type LegacyHookFn = Arc<dyn Fn(&ChildListChange) + Send + Sync>;

/// Identifier of one registered legacy mutation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyHookId(pub(crate) u64);

/// Asynchronous subscription to one node's direct child-list edits.
///
/// Batches queue in arrival order and are drained with [`next`]. The
/// subscription ends when the observed node is dropped or the observer is
/// disconnected; dropping the observer disconnects it.
///
/// [`next`]: ChildListObserver::next
pub struct ChildListObserver {
	node: Weak<NodeInner>,
	slot: u64,
	rx: mpsc::UnboundedReceiver<ChildListChange>,
	connected: bool,
}

impl ChildListObserver {
	pub(crate) fn new(
		node: Weak<NodeInner>,
		slot: u64,
		rx: mpsc::UnboundedReceiver<ChildListChange>,
	) -> Self {
		Self {
			node,
			slot,
			rx,
			connected: true,
		}
	}

	/// Waits for the next observed batch. Returns `None` once the
	/// subscription is dead.
	pub async fn next(&mut self) -> Option<ChildListChange> {
		if !self.connected {
			return None;
		}
		self.rx.recv().await
	}

	/// Drains one already-queued batch without waiting.
	pub fn try_next(&mut self) -> Option<ChildListChange> {
		if !self.connected {
			return None;
		}
		self.rx.try_recv().ok()
	}

	/// Stops observation. Batches still queued are no longer delivered.
	pub fn disconnect(&mut self) {
		if !self.connected {
			return;
		}
		self.connected = false;
		if let Some(node) = self.node.upgrade() {
			node.remove_observer(self.slot);
		}
		self.rx.close();
	}
}

impl Drop for ChildListObserver {
	fn drop(&mut self) {
		self.disconnect();
	}
}

impl fmt::Debug for ChildListObserver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChildListObserver")
			.field("slot", &self.slot)
			.field("connected", &self.connected)
			.finish()
	}
}
