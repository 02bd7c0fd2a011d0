use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::DomError;
use crate::document::DocumentShared;
use crate::observe::{ChildListChange, ChildListObserver, LegacyHookFn, LegacyHookId};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one host document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Handle to one element of a host document tree.
///
/// Clones share the same underlying node; `==` compares handle identity, not
/// structure. A node is *attached* while it can reach the root of a live
/// [`crate::Document`] through parent links.
#[derive(Clone)]
pub struct Node {
	inner: Arc<NodeInner>,
}

pub(crate) struct NodeInner {
	id: NodeId,
	tag: String,
	state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
	parent: Weak<NodeInner>,
	children: Vec<Node>,
	attributes: HashMap<String, String>,
	text: String,
	/// Set on document roots only; everything else inherits attachment by
	/// climbing to the root.
	document: Option<Arc<DocumentShared>>,
	observers: Vec<ObserverSlot>,
	legacy_hooks: Vec<LegacyHookSlot>,
	next_slot: u64,
}

struct ObserverSlot {
	id: u64,
	tx: mpsc::UnboundedSender<ChildListChange>,
}

struct LegacyHookSlot {
	id: u64,
	hook: LegacyHookFn,
}

impl Node {
	/// Creates a detached element.
	pub fn element(tag: impl Into<String>) -> Self {
		Self::build(tag.into(), None)
	}

	pub(crate) fn document_root(shared: Arc<DocumentShared>) -> Self {
		Self::build("document".into(), Some(shared))
	}

	fn build(tag: String, document: Option<Arc<DocumentShared>>) -> Self {
		let state = NodeState {
			document,
			..NodeState::default()
		};
		Self {
			inner: Arc::new(NodeInner {
				id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
				tag,
				state: Mutex::new(state),
			}),
		}
	}

	pub fn id(&self) -> NodeId {
		self.inner.id
	}

	pub fn tag(&self) -> &str {
		&self.inner.tag
	}

	pub fn parent(&self) -> Option<Node> {
		self.inner.state.lock().parent.upgrade().map(|inner| Node { inner })
	}

	/// Snapshot of the direct children, in document order.
	pub fn children(&self) -> Vec<Node> {
		self.inner.state.lock().children.clone()
	}

	/// True while this node can reach the root of a live document.
	pub fn is_attached(&self) -> bool {
		self.live_document().is_some()
	}

	/// Appends `child` as the last direct child, reparenting it if needed.
	///
	/// Emits one removal batch on the old parent (when there was one) and one
	/// addition batch on `self`.
	pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
		if self.is_or_descends_from(child) {
			return Err(DomError::WouldCycle {
				parent: self.id(),
				child: child.id(),
			});
		}
		if let Some(old_parent) = child.parent() {
			old_parent.detach_child(child);
		}
		{
			let mut child_state = child.inner.state.lock();
			child_state.parent = Arc::downgrade(&self.inner);
		}
		{
			let mut state = self.inner.state.lock();
			state.children.push(child.clone());
		}
		tracing::trace!(parent = self.id().0, child = child.id().0, "dom.append_child");
		self.notify_child_list(ChildListChange {
			added: vec![child.clone()],
			removed: Vec::new(),
		});
		Ok(())
	}

	/// Removes a direct child, detaching its subtree.
	pub fn remove_child(&self, child: &Node) -> Result<(), DomError> {
		if !self.detach_child(child) {
			return Err(DomError::NotAChild {
				parent: self.id(),
				child: child.id(),
			});
		}
		tracing::trace!(parent = self.id().0, child = child.id().0, "dom.remove_child");
		Ok(())
	}

	pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
		self.inner.state.lock().attributes.insert(name.into(), value.into());
	}

	pub fn attribute(&self, name: &str) -> Option<String> {
		self.inner.state.lock().attributes.get(name).cloned()
	}

	pub fn set_text(&self, text: impl Into<String>) {
		self.inner.state.lock().text = text.into();
	}

	pub fn text(&self) -> String {
		self.inner.state.lock().text.clone()
	}

	/// Subscribes to this node's direct child-list edits.
	///
	/// Batches queue until the observer polls them; nothing runs inline with
	/// the mutating call. Dropping the observer disconnects it.
	pub fn observe_children(&self) -> ChildListObserver {
		let (tx, rx) = mpsc::unbounded_channel();
		let slot = {
			let mut state = self.inner.state.lock();
			let id = state.next_slot;
			state.next_slot += 1;
			state.observers.push(ObserverSlot { id, tx });
			id
		};
		tracing::trace!(node = self.id().0, slot, "dom.observe_children");
		ChildListObserver::new(Arc::downgrade(&self.inner), slot, rx)
	}

	/// Registers a deprecated synchronous mutation callback.
	///
	/// The hook runs inline during the mutating call, but only while this
	/// node is attached to a document with legacy mutation events enabled.
	/// Anywhere else the registration is accepted and sits dormant.
	pub fn hook_child_mutations(
		&self,
		hook: impl Fn(&ChildListChange) + Send + Sync + 'static,
	) -> LegacyHookId {
		let mut state = self.inner.state.lock();
		let id = state.next_slot;
		state.next_slot += 1;
		state.legacy_hooks.push(LegacyHookSlot {
			id,
			hook: Arc::new(hook),
		});
		LegacyHookId(id)
	}

	/// Removes a legacy mutation callback. Returns `false` if it was already
	/// gone.
	pub fn unhook_child_mutations(&self, id: LegacyHookId) -> bool {
		let mut state = self.inner.state.lock();
		let before = state.legacy_hooks.len();
		state.legacy_hooks.retain(|slot| slot.id != id.0);
		before != state.legacy_hooks.len()
	}

	/// Walks parent links to the root and returns its document, if that
	/// document is still alive.
	pub(crate) fn live_document(&self) -> Option<Arc<DocumentShared>> {
		let mut cursor = self.inner.clone();
		loop {
			let (document, parent) = {
				let state = cursor.state.lock();
				(state.document.clone(), state.parent.upgrade())
			};
			if let Some(document) = document {
				return document.is_alive().then_some(document);
			}
			cursor = parent?;
		}
	}

	fn is_or_descends_from(&self, candidate: &Node) -> bool {
		let mut cursor = Some(self.clone());
		while let Some(node) = cursor {
			if node == *candidate {
				return true;
			}
			cursor = node.parent();
		}
		false
	}

	/// Unlinks `child` from this node's child list. Returns `false` when it
	/// was not a direct child.
	fn detach_child(&self, child: &Node) -> bool {
		let removed = {
			let mut state = self.inner.state.lock();
			let before = state.children.len();
			state.children.retain(|existing| existing != child);
			before != state.children.len()
		};
		if removed {
			child.inner.state.lock().parent = Weak::new();
			self.notify_child_list(ChildListChange {
				added: Vec::new(),
				removed: vec![child.clone()],
			});
		}
		removed
	}

	/// Fans one change batch out to observers and, on legacy documents, to
	/// synchronous hooks.
	///
	/// The legacy capability is resolved before taking the state lock, and
	/// hooks run with no locks held, so a hook may mutate the tree again.
	fn notify_child_list(&self, change: ChildListChange) {
		let legacy = self
			.live_document()
			.is_some_and(|document| document.legacy_mutation_events());
		let (observers, hooks) = {
			let mut state = self.inner.state.lock();
			state.observers.retain(|slot| !slot.tx.is_closed());
			let observers: Vec<_> = state.observers.iter().map(|slot| slot.tx.clone()).collect();
			let hooks: Vec<LegacyHookFn> = if legacy {
				state.legacy_hooks.iter().map(|slot| slot.hook.clone()).collect()
			} else {
				Vec::new()
			};
			(observers, hooks)
		};
		for tx in observers {
			let _ = tx.send(change.clone());
		}
		for hook in hooks {
			hook(&change);
		}
	}
}

impl NodeInner {
	pub(crate) fn remove_observer(&self, slot: u64) {
		self.state.lock().observers.retain(|existing| existing.id != slot);
	}
}

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Node {}

impl fmt::Debug for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Node")
			.field("id", &self.id())
			.field("tag", &self.tag())
			.finish()
	}
}
