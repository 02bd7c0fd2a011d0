use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use reflow_dom::{LegacyHookId, Node};

/// Identity of one mounted editor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

pub(crate) struct InstanceInner {
	id: InstanceId,
	target: Node,
	root: RwLock<Option<Node>>,
	update_active: AtomicBool,
	layout_passes: AtomicU64,
	legacy_hook: Mutex<Option<(Node, LegacyHookId)>>,
}

impl Drop for InstanceInner {
	fn drop(&mut self) {
		if let Some((node, id)) = self.legacy_hook.get_mut().take() {
			node.unhook_child_mutations(id);
		}
	}
}

/// Handle to one mounted editor instance.
///
/// Clones share the same instance. The *update activity flag* lives here,
/// per instance: it marks an update invocation as in progress so that
/// feedback through synchronous mutation delivery cannot recurse.
#[derive(Clone)]
pub struct EditorInstance {
	inner: Arc<InstanceInner>,
}

impl EditorInstance {
	pub(crate) fn new(id: InstanceId, target: Node) -> Self {
		Self {
			inner: Arc::new(InstanceInner {
				id,
				target,
				root: RwLock::new(None),
				update_active: AtomicBool::new(false),
				layout_passes: AtomicU64::new(0),
				legacy_hook: Mutex::new(None),
			}),
		}
	}

	pub fn id(&self) -> InstanceId {
		self.inner.id
	}

	/// Node the instance was mounted on.
	pub fn target(&self) -> Node {
		self.inner.target.clone()
	}

	/// Root node bound during init, if init ran and bound one.
	pub fn root(&self) -> Option<Node> {
		self.inner.root.read().clone()
	}

	/// Binds `node` as this instance's root. Init strategies call this.
	pub fn bind_root(&self, node: Node) {
		*self.inner.root.write() = Some(node);
	}

	/// True while an update invocation is marked in progress.
	pub fn update_active(&self) -> bool {
		self.inner.update_active.load(Ordering::Acquire)
	}

	/// Marks an update as in progress. Returns `false` when one already is.
	/// A caller that got `true` owns the flag and must clear it with
	/// [`finish_update`](Self::finish_update) on every exit path.
	pub fn begin_update(&self) -> bool {
		!self.inner.update_active.swap(true, Ordering::Acquire)
	}

	/// Clears the in-progress mark.
	pub fn finish_update(&self) {
		self.inner.update_active.store(false, Ordering::Release);
	}

	/// Number of layout passes completed by the stock update entry point.
	pub fn layout_passes(&self) -> u64 {
		self.inner.layout_passes.load(Ordering::Acquire)
	}

	pub(crate) fn record_layout_pass(&self) -> u64 {
		self.inner.layout_passes.fetch_add(1, Ordering::AcqRel) + 1
	}

	pub(crate) fn remember_legacy_hook(&self, node: Node, id: LegacyHookId) {
		*self.inner.legacy_hook.lock() = Some((node, id));
	}

	pub fn downgrade(&self) -> WeakEditorInstance {
		WeakEditorInstance {
			inner: Arc::downgrade(&self.inner),
		}
	}
}

impl fmt::Debug for EditorInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EditorInstance")
			.field("id", &self.inner.id)
			.field("update_active", &self.update_active())
			.finish()
	}
}

/// Weak counterpart of [`EditorInstance`], for wiring that must not keep an
/// instance alive.
#[derive(Clone)]
pub struct WeakEditorInstance {
	inner: Weak<InstanceInner>,
}

impl WeakEditorInstance {
	pub fn upgrade(&self) -> Option<EditorInstance> {
		self.inner.upgrade().map(|inner| EditorInstance { inner })
	}
}

#[cfg(test)]
mod tests {
	use reflow_dom::Node;

	use super::{EditorInstance, InstanceId};

	#[test]
	fn activity_flag_admits_one_holder() {
		let instance = EditorInstance::new(InstanceId(1), Node::element("div"));
		assert!(instance.begin_update());
		assert!(instance.update_active());
		assert!(!instance.begin_update());
		instance.finish_update();
		assert!(!instance.update_active());
		assert!(instance.begin_update());
	}

	#[test]
	fn weak_handle_dies_with_the_instance() {
		let instance = EditorInstance::new(InstanceId(2), Node::element("div"));
		let weak = instance.downgrade();
		assert!(weak.upgrade().is_some());
		drop(instance);
		assert!(weak.upgrade().is_none());
	}
}
