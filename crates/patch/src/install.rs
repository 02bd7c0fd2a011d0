use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use reflow_embed::{
	EditorInstance, EditorLibrary, HostScope, InitFn, ReflowHooks, UpdateFn, WeakReflowHooks,
};
use tokio_util::sync::CancellationToken;

use crate::config::PatchConfig;
use crate::error::PatchError;
use crate::guard::guarded_update;
use crate::locate::{self, LocateOutcome};
use crate::{observe, runtime};

/// Observable lifecycle of one install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
	/// Discovery is polling for the library.
	Locating,
	/// Both entry points are wrapped by this handle.
	Installed,
	/// Another install already wrapped this library; this one did nothing.
	AlreadyInstalled,
	/// The library was located but left unpatched.
	Incompatible,
	/// Discovery exhausted its attempt cap.
	GaveUp,
	/// Teardown restored the original entry points.
	TornDown,
}

/// Originals captured at install time, for teardown.
struct Installed {
	hooks: WeakReflowHooks,
	original_init: Arc<InitFn>,
	original_update: Arc<UpdateFn>,
}

pub(crate) struct PatchShared {
	pub(crate) config: PatchConfig,
	pub(crate) cancel: CancellationToken,
	pub(crate) live_bindings: AtomicUsize,
	state: Mutex<PatchState>,
	failure: Mutex<Option<PatchError>>,
	installed: Mutex<Option<Installed>>,
}

impl PatchShared {
	fn set_state(&self, next: PatchState) {
		*self.state.lock() = next;
	}
}

/// Installs the reflow patch against `scope`.
///
/// Returns immediately; discovery and installation run on the ambient
/// runtime. The handle reports progress and supports teardown. Dropping
/// the handle without teardown leaves an installed patch in place for the
/// life of the process.
pub fn install(scope: &HostScope, config: PatchConfig) -> PatchHandle {
	let shared = Arc::new(PatchShared {
		config,
		cancel: CancellationToken::new(),
		live_bindings: AtomicUsize::new(0),
		state: Mutex::new(PatchState::Locating),
		failure: Mutex::new(None),
		installed: Mutex::new(None),
	});
	let scope = scope.clone();
	let task_shared = shared.clone();
	runtime::spawn(async move {
		match locate::run(&scope, &task_shared).await {
			LocateOutcome::Found(library) => {
				// Holding the slot lock serializes against a concurrent
				// teardown; a cancelled install must not wrap.
				let mut slot = task_shared.installed.lock();
				if task_shared.cancel.is_cancelled() {
					return;
				}
				let state = wrap_entry_points(&library, &task_shared, &mut slot);
				task_shared.set_state(state);
			}
			LocateOutcome::GaveUp { attempts } => {
				*task_shared.failure.lock() = Some(PatchError::GaveUp { attempts });
				task_shared.set_state(PatchState::GaveUp);
			}
			LocateOutcome::Cancelled => {}
		}
	});
	PatchHandle { shared }
}

/// Swaps in both decorators, all or nothing.
///
/// The wrap latch is claimed first; only its holder touches the slots. The
/// update decorator goes in before the init decorator so an instance
/// mounted mid-install can never observe a bound observation without the
/// guard.
fn wrap_entry_points(
	library: &EditorLibrary,
	shared: &Arc<PatchShared>,
	slot: &mut Option<Installed>,
) -> PatchState {
	let Some(hooks) = library.reflow() else {
		let error = PatchError::Incompatible {
			reason: "reflow construct missing".into(),
		};
		tracing::warn!(error = ?error, "patch.install.incompatible");
		*shared.failure.lock() = Some(error);
		return PatchState::Incompatible;
	};
	if !hooks.claim_wrap() {
		tracing::debug!("patch.install.already_wrapped");
		return PatchState::AlreadyInstalled;
	}
	let original_init = hooks.init_fn();
	let original_update = hooks.update_fn();
	hooks.set_update_fn(guarded_update(original_update.clone()));
	hooks.set_init_fn(observing_init(original_init.clone(), &hooks, shared));
	*slot = Some(Installed {
		hooks: hooks.downgrade(),
		original_init,
		original_update,
	});
	tracing::info!("patch.install.wrapped");
	PatchState::Installed
}

/// Decorates the init entry point: run the original, then attach the
/// observation binding to whatever root it bound.
///
/// Init failures propagate to the mount caller unchanged and leave the
/// instance unbound. An init that binds no root gets no binding either;
/// that instance simply keeps stock behavior.
fn observing_init(
	original: Arc<InitFn>,
	hooks: &ReflowHooks,
	shared: &Arc<PatchShared>,
) -> Arc<InitFn> {
	let weak_hooks = hooks.downgrade();
	let shared = Arc::clone(shared);
	Arc::new(move |instance: &EditorInstance| {
		(original)(instance)?;
		match instance.root() {
			Some(root) => observe::bind_instance(&shared, &weak_hooks, instance, &root),
			None => tracing::debug!(instance = instance.id().0, "patch.install.root_unbound"),
		}
		Ok(())
	})
}

/// Handle to one patch installation.
///
/// Cheap to clone. Dropping every handle does not undo the patch; call
/// [`teardown`](Self::teardown) for that.
#[derive(Clone)]
pub struct PatchHandle {
	shared: Arc<PatchShared>,
}

impl PatchHandle {
	/// Current lifecycle state.
	pub fn state(&self) -> PatchState {
		*self.shared.state.lock()
	}

	/// Failure recorded by discovery or installation, if any.
	pub fn failure(&self) -> Option<PatchError> {
		self.shared.failure.lock().clone()
	}

	/// Number of editor instances currently holding an observation binding.
	pub fn live_bindings(&self) -> usize {
		self.shared.live_bindings.load(Ordering::Acquire)
	}

	/// Restores the original entry points and stops discovery and all
	/// observation bindings of this install.
	///
	/// Editors mounted while the patch was installed keep running; they
	/// just lose coalesced re-layout. Safe to call more than once.
	pub fn teardown(&self) {
		self.shared.cancel.cancel();
		let mut slot = self.shared.installed.lock();
		if let Some(installed) = slot.take()
			&& let Some(hooks) = installed.hooks.upgrade()
		{
			hooks.set_init_fn(installed.original_init);
			hooks.set_update_fn(installed.original_update);
			hooks.release_wrap();
			tracing::debug!("patch.teardown.restored");
		}
		self.shared.set_state(PatchState::TornDown);
	}
}

impl fmt::Debug for PatchHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PatchHandle")
			.field("state", &self.state())
			.field("live_bindings", &self.live_bindings())
			.finish()
	}
}
