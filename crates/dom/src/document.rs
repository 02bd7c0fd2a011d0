use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::node::Node;

/// Liveness and capability state shared between a [`Document`] and the nodes
/// attached under its root.
pub(crate) struct DocumentShared {
	alive: AtomicBool,
	legacy_mutation_events: bool,
}

impl DocumentShared {
	pub(crate) fn is_alive(&self) -> bool {
		self.alive.load(Ordering::Acquire)
	}

	pub(crate) fn legacy_mutation_events(&self) -> bool {
		self.legacy_mutation_events
	}
}

/// A live host document.
///
/// Nodes are attached while they can reach this document's root; dropping
/// the `Document` detaches the entire tree in place.
pub struct Document {
	shared: Arc<DocumentShared>,
	root: Node,
}

impl Document {
	/// Creates a modern document. Legacy synchronous mutation events are
	/// disabled; only [`Node::observe_children`] reports edits.
	pub fn new() -> Self {
		Self::build(false)
	}

	/// Creates a document with the deprecated synchronous mutation events
	/// still enabled, as on old hosts.
	pub fn with_legacy_mutation_events() -> Self {
		Self::build(true)
	}

	fn build(legacy_mutation_events: bool) -> Self {
		let shared = Arc::new(DocumentShared {
			alive: AtomicBool::new(true),
			legacy_mutation_events,
		});
		let root = Node::document_root(shared.clone());
		tracing::debug!(
			root = root.id().0,
			legacy = legacy_mutation_events,
			"dom.document.created"
		);
		Self { shared, root }
	}

	/// Root element of this document.
	pub fn root(&self) -> Node {
		self.root.clone()
	}

	pub fn legacy_mutation_events(&self) -> bool {
		self.shared.legacy_mutation_events
	}
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Document {
	fn drop(&mut self) {
		self.shared.alive.store(false, Ordering::Release);
	}
}
