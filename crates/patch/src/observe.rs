use std::sync::Arc;
use std::sync::atomic::Ordering;

use reflow_dom::{ChildListObserver, Node};
use reflow_embed::{EditorInstance, InstanceId, WeakEditorInstance, WeakReflowHooks};
use tokio::time::Instant;

use crate::install::PatchShared;
use crate::runtime;

/// Attaches the coalescing observation binding for one freshly initialized
/// editor instance.
///
/// The observer is registered here, synchronously, so edits made right
/// after mount are already queued when the binding task starts.
pub(crate) fn bind_instance(
	shared: &Arc<PatchShared>,
	hooks: &WeakReflowHooks,
	instance: &EditorInstance,
	root: &Node,
) {
	let observer = root.observe_children();
	let id = instance.id();
	tracing::debug!(instance = id.0, root = root.id().0, "patch.observe.bind");
	runtime::spawn(binding_task(
		Arc::clone(shared),
		hooks.clone(),
		instance.downgrade(),
		observer,
		id,
	));
}

/// One instance's scheduler: turns bursts of child-list changes into a
/// single update invocation after a quiescence window.
///
/// Every observed batch replaces the armed deadline, so the update runs
/// only once edits stop for the full window. The task ends on teardown,
/// when the observed node is dropped, or when the instance dies.
async fn binding_task(
	shared: Arc<PatchShared>,
	hooks: WeakReflowHooks,
	instance: WeakEditorInstance,
	mut observer: ChildListObserver,
	id: InstanceId,
) {
	let _live = BindingGauge::count(&shared);
	let quiescence = shared.config.quiescence;
	let mut deadline = Instant::now();
	let mut armed = false;
	loop {
		tokio::select! {
			_ = shared.cancel.cancelled() => break,
			batch = observer.next() => match batch {
				Some(change) => {
					tracing::trace!(
						instance = id.0,
						added = change.added.len(),
						removed = change.removed.len(),
						"patch.observe.change"
					);
					deadline = Instant::now() + quiescence;
					armed = true;
				}
				None => break,
			},
			_ = tokio::time::sleep_until(deadline), if armed => {
				armed = false;
				if !fire(&hooks, &instance, id) {
					break;
				}
			}
		}
	}
	tracing::debug!(instance = id.0, "patch.observe.unbind");
}

/// Runs one coalesced update, if the guards allow it.
///
/// A skipped update is not rescheduled; the next observed change arms a
/// fresh deadline. Returns `false` once the binding is dead because the
/// instance or the library is gone.
fn fire(hooks: &WeakReflowHooks, instance: &WeakEditorInstance, id: InstanceId) -> bool {
	let Some(instance) = instance.upgrade() else {
		return false;
	};
	let Some(hooks) = hooks.upgrade() else {
		return false;
	};
	if instance.update_active() {
		tracing::trace!(instance = id.0, "patch.observe.skip_active");
		return true;
	}
	let attached = instance.root().is_some_and(|root| root.is_attached());
	if !attached {
		tracing::trace!(instance = id.0, "patch.observe.skip_detached");
		return true;
	}
	tracing::debug!(instance = id.0, "patch.observe.fire");
	if let Err(error) = hooks.invoke_update(&instance) {
		tracing::warn!(instance = id.0, error = ?error, "patch.observe.update_failed");
	}
	true
}

/// Keeps the handle's live-binding count honest across every task exit
/// path.
struct BindingGauge(Arc<PatchShared>);

impl BindingGauge {
	fn count(shared: &Arc<PatchShared>) -> Self {
		shared.live_bindings.fetch_add(1, Ordering::AcqRel);
		Self(Arc::clone(shared))
	}
}

impl Drop for BindingGauge {
	fn drop(&mut self) {
		self.0.live_bindings.fetch_sub(1, Ordering::AcqRel);
	}
}
