use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use reflow_dom::Node;

use crate::EmbedError;
use crate::instance::{EditorInstance, InstanceId};

/// Init entry-point strategy, run once per instance right after
/// construction.
pub type InitFn = dyn Fn(&EditorInstance) -> Result<(), EmbedError> + Send + Sync;

/// Update entry-point strategy, recomputing layout for one instance.
pub type UpdateFn = dyn Fn(&EditorInstance) -> Result<(), EmbedError> + Send + Sync;

pub(crate) struct HooksInner {
	init: RwLock<Arc<InitFn>>,
	update: RwLock<Arc<UpdateFn>>,
	wrapped: AtomicBool,
}

/// The library's internal scroll/reflow construct.
///
/// Holds the two entry points as swappable strategy slots. Invocations
/// resolve the current slot value at call time, so replacing a slot also
/// redirects calls issued from the library's own paths. The wrap latch is a
/// one-bit claim for external decorators: only its holder may swap both
/// slots, which keeps wrappers from stacking.
#[derive(Clone)]
pub struct ReflowHooks {
	inner: Arc<HooksInner>,
}

impl ReflowHooks {
	fn stock() -> Self {
		let inner = Arc::new_cyclic(|weak: &Weak<HooksInner>| HooksInner {
			init: RwLock::new(stock_init(weak.clone())),
			update: RwLock::new(stock_update()),
			wrapped: AtomicBool::new(false),
		});
		Self { inner }
	}

	/// Current init strategy.
	pub fn init_fn(&self) -> Arc<InitFn> {
		self.inner.init.read().clone()
	}

	/// Replaces the init strategy.
	pub fn set_init_fn(&self, init: Arc<InitFn>) {
		*self.inner.init.write() = init;
	}

	/// Current update strategy.
	pub fn update_fn(&self) -> Arc<UpdateFn> {
		self.inner.update.read().clone()
	}

	/// Replaces the update strategy.
	pub fn set_update_fn(&self, update: Arc<UpdateFn>) {
		*self.inner.update.write() = update;
	}

	/// Runs the current update entry point on `instance`. No slot lock is
	/// held during the call, so the strategy itself may swap slots.
	pub fn invoke_update(&self, instance: &EditorInstance) -> Result<(), EmbedError> {
		(self.update_fn())(instance)
	}

	pub(crate) fn invoke_init(&self, instance: &EditorInstance) -> Result<(), EmbedError> {
		(self.init_fn())(instance)
	}

	/// Claims the one-time wrap latch. Returns `false` when another wrapper
	/// already holds it.
	pub fn claim_wrap(&self) -> bool {
		self.inner
			.wrapped
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}

	/// Releases the wrap latch once the original strategies are restored.
	pub fn release_wrap(&self) {
		self.inner.wrapped.store(false, Ordering::Release);
	}

	/// True while an external wrapper holds the latch.
	pub fn is_wrapped(&self) -> bool {
		self.inner.wrapped.load(Ordering::Acquire)
	}

	pub fn downgrade(&self) -> WeakReflowHooks {
		WeakReflowHooks {
			inner: Arc::downgrade(&self.inner),
		}
	}
}

/// Weak counterpart of [`ReflowHooks`], for wiring that must not keep the
/// library alive.
#[derive(Clone)]
pub struct WeakReflowHooks {
	inner: Weak<HooksInner>,
}

impl WeakReflowHooks {
	pub fn upgrade(&self) -> Option<ReflowHooks> {
		self.inner.upgrade().map(|inner| ReflowHooks { inner })
	}
}

/// Stock init: bind the mount target as the instance root, then wire
/// re-layout to the deprecated synchronous mutation events on that root.
///
/// The wiring holds only weak references, so a dead instance or a dropped
/// library turns the hook into a no-op instead of leaking either.
fn stock_init(hooks: Weak<HooksInner>) -> Arc<InitFn> {
	Arc::new(move |instance: &EditorInstance| {
		let target = instance.target();
		instance.bind_root(target.clone());
		let weak_instance = instance.downgrade();
		let weak_hooks = hooks.clone();
		let hook_id = target.hook_child_mutations(move |_change| {
			let Some(instance) = weak_instance.upgrade() else {
				return;
			};
			let Some(inner) = weak_hooks.upgrade() else {
				return;
			};
			let hooks = ReflowHooks { inner };
			if let Err(err) = hooks.invoke_update(&instance) {
				tracing::warn!(
					instance = instance.id().0,
					error = ?err,
					"embed.reflow.legacy_update_failed"
				);
			}
		});
		instance.remember_legacy_hook(target, hook_id);
		tracing::trace!(instance = instance.id().0, "embed.reflow.init");
		Ok(())
	})
}

/// Stock update: one layout pass over the bound root.
fn stock_update() -> Arc<UpdateFn> {
	Arc::new(|instance: &EditorInstance| {
		if instance.root().is_none() {
			return Err(EmbedError::RootUnbound);
		}
		let passes = instance.record_layout_pass();
		tracing::trace!(instance = instance.id().0, passes, "embed.reflow.layout_pass");
		Ok(())
	})
}

pub(crate) struct LibraryInner {
	reflow: Option<ReflowHooks>,
	next_instance: AtomicU64,
}

/// Cloneable handle to the embedded editing library's root object.
#[derive(Clone)]
pub struct EditorLibrary {
	inner: Arc<LibraryInner>,
}

impl EditorLibrary {
	/// Stock build, carrying the default reflow construct.
	pub fn new() -> Self {
		Self::build(Some(ReflowHooks::stock()))
	}

	/// Older build lacking the reflow construct. Editors mounted by such a
	/// build skip reflow initialization entirely.
	pub fn without_reflow() -> Self {
		Self::build(None)
	}

	fn build(reflow: Option<ReflowHooks>) -> Self {
		Self {
			inner: Arc::new(LibraryInner {
				reflow,
				next_instance: AtomicU64::new(1),
			}),
		}
	}

	/// The internal scroll/reflow construct, when this build carries one.
	pub fn reflow(&self) -> Option<ReflowHooks> {
		self.inner.reflow.clone()
	}

	/// Constructs an editor instance on `target` and runs the current init
	/// entry point. Init errors abort the mount and propagate unchanged.
	pub fn mount_editor(&self, target: &Node) -> Result<EditorInstance, EmbedError> {
		let id = InstanceId(self.inner.next_instance.fetch_add(1, Ordering::Relaxed));
		let instance = EditorInstance::new(id, target.clone());
		if let Some(reflow) = &self.inner.reflow {
			reflow.invoke_init(&instance)?;
		}
		tracing::debug!(instance = id.0, target = target.id().0, "embed.library.mounted");
		Ok(instance)
	}
}

impl Default for EditorLibrary {
	fn default() -> Self {
		Self::new()
	}
}
