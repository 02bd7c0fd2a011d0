//! End-to-end behavior of the installed patch against a live scope,
//! library, and document, on paused time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reflow_dom::{Document, Node};
use reflow_embed::{EditorInstance, EditorLibrary, EmbedError, HostScope};
use reflow_patch::{PatchConfig, PatchError, PatchHandle, PatchState, install};
use tokio::time::advance;

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Lets spawned patch tasks drain queued events and register timers.
async fn settle() {
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}
}

async fn advance_settled(ms: u64) {
	advance(Duration::from_millis(ms)).await;
	settle().await;
}

async fn installed_patch() -> (HostScope, EditorLibrary, PatchHandle) {
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	scope.bind_library("plume", library.clone());
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Installed);
	(scope, library, handle)
}

fn mount_editor(doc: &Document, library: &EditorLibrary) -> (Node, EditorInstance) {
	let target = Node::element("editor");
	doc.root().append_child(&target).unwrap();
	let instance = library.mount_editor(&target).unwrap();
	(target, instance)
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn install_wraps_a_present_library() {
	init_tracing();
	let (_scope, library, handle) = installed_patch().await;
	assert!(library.reflow().unwrap().is_wrapped());
	assert!(handle.failure().is_none());
	assert_eq!(handle.live_bindings(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn discovery_retries_until_the_library_appears() {
	let scope = HostScope::new();
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Locating);

	advance_settled(100).await;
	advance_settled(100).await;
	assert_eq!(handle.state(), PatchState::Locating);

	advance_settled(50).await;
	scope.bind_library("plume", EditorLibrary::new());
	settle().await;
	// A binding between polls is picked up by the next tick, not sooner.
	assert_eq!(handle.state(), PatchState::Locating);
	advance_settled(50).await;
	assert_eq!(handle.state(), PatchState::Installed);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn discovery_gives_up_at_the_attempt_cap() {
	let scope = HostScope::new();
	let handle = install(&scope, PatchConfig::default().max_locate_attempts(3));
	settle().await;
	assert_eq!(handle.state(), PatchState::Locating);
	advance_settled(100).await;
	assert_eq!(handle.state(), PatchState::Locating);
	advance_settled(100).await;
	assert_eq!(handle.state(), PatchState::GaveUp);
	assert!(matches!(
		handle.failure(),
		Some(PatchError::GaveUp { attempts: 3 })
	));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn discovery_follows_wrapper_access_paths() {
	let scope = HostScope::new();
	let wrapper = HostScope::new();
	wrapper.bind_library("plume", EditorLibrary::new());
	scope.bind_scope("toolkit", wrapper);
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Installed);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn incompatible_library_is_left_unpatched() {
	let scope = HostScope::new();
	let library = EditorLibrary::without_reflow();
	scope.bind_library("plume", library.clone());
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Incompatible);
	assert!(matches!(
		handle.failure(),
		Some(PatchError::Incompatible { .. })
	));
	// Mounting still works; the editor just keeps stock behavior.
	assert!(library.mount_editor(&Node::element("editor")).is_ok());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn second_install_is_a_no_op() {
	let (scope, library, first) = installed_patch().await;
	let second = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(second.state(), PatchState::AlreadyInstalled);

	let doc = Document::new();
	let (_target, _instance) = mount_editor(&doc, &library);
	settle().await;
	// One decorator layer: only the first handle owns bindings.
	assert_eq!(first.live_bindings(), 1);
	assert_eq!(second.live_bindings(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rapid_edits_coalesce_into_one_update() {
	init_tracing();
	let (_scope, library, _handle) = installed_patch().await;
	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;

	for _ in 0..10 {
		target.append_child(&Node::element("p")).unwrap();
		settle().await;
		advance_settled(10).await;
	}
	assert_eq!(instance.layout_passes(), 0);

	// The last edit landed at t+90, so its window closes at t+240.
	advance_settled(139).await;
	assert_eq!(instance.layout_passes(), 0);
	advance_settled(2).await;
	assert_eq!(instance.layout_passes(), 1);

	advance_settled(1000).await;
	assert_eq!(instance.layout_passes(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn a_quiet_editor_never_updates() {
	let (_scope, library, _handle) = installed_patch().await;
	let doc = Document::new();
	let (_target, instance) = mount_editor(&doc, &library);
	settle().await;
	advance_settled(10_000).await;
	assert_eq!(instance.layout_passes(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn detached_root_skips_the_pending_update() {
	let (_scope, library, _handle) = installed_patch().await;
	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;

	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(100).await;
	doc.root().remove_child(&target).unwrap();
	advance_settled(100).await;
	assert_eq!(instance.layout_passes(), 0);

	// Reattaching alone changes nothing; the next real edit re-arms.
	doc.root().append_child(&target).unwrap();
	advance_settled(500).await;
	assert_eq!(instance.layout_passes(), 0);
	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(instance.layout_passes(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn reentrant_feedback_is_suppressed() {
	init_tracing();
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	let hooks = library.reflow().unwrap();
	let calls = Arc::new(AtomicUsize::new(0));
	let update_calls = calls.clone();
	hooks.set_update_fn(Arc::new(move |instance: &EditorInstance| {
		if update_calls.fetch_add(1, Ordering::SeqCst) == 0 {
			// The first pass mutates the tree it is laying out. On a
			// legacy document that feeds straight back into the update
			// slot.
			let root = instance.root().expect("root bound");
			root.append_child(&Node::element("injected")).unwrap();
			assert!(instance.update_active());
		}
		Ok(())
	}));
	scope.bind_library("plume", library.clone());
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Installed);

	let doc = Document::with_legacy_mutation_events();
	let (_target, instance) = mount_editor(&doc, &library);
	settle().await;

	hooks.invoke_update(&instance).unwrap();
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(!instance.update_active());

	// The injected edit was also observed; the coalesced pass follows.
	settle().await;
	advance_settled(151).await;
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn a_failing_update_does_not_wedge_the_binding() {
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	let hooks = library.reflow().unwrap();
	let calls = Arc::new(AtomicUsize::new(0));
	let update_calls = calls.clone();
	hooks.set_update_fn(Arc::new(move |_: &EditorInstance| {
		if update_calls.fetch_add(1, Ordering::SeqCst) == 0 {
			return Err(EmbedError::Update("transient".into()));
		}
		Ok(())
	}));
	scope.bind_library("plume", library.clone());
	let _handle = install(&scope, PatchConfig::default());
	settle().await;

	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;

	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(!instance.update_active());

	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn editors_mounted_before_install_keep_stock_behavior() {
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	let doc = Document::new();
	let (target, early) = mount_editor(&doc, &library);
	scope.bind_library("plume", library.clone());
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Installed);

	target.append_child(&Node::element("p")).unwrap();
	advance_settled(500).await;
	assert_eq!(early.layout_passes(), 0);
	assert_eq!(handle.live_bindings(), 0);

	let (late_target, late) = mount_editor(&doc, &library);
	settle().await;
	assert_eq!(handle.live_bindings(), 1);
	late_target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(late.layout_passes(), 1);
	assert_eq!(early.layout_passes(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn teardown_restores_the_original_entry_points() {
	init_tracing();
	let (scope, library, handle) = installed_patch().await;
	let hooks = library.reflow().unwrap();
	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;
	assert_eq!(handle.live_bindings(), 1);

	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(instance.layout_passes(), 1);

	handle.teardown();
	settle().await;
	assert_eq!(handle.state(), PatchState::TornDown);
	assert!(!hooks.is_wrapped());
	assert_eq!(handle.live_bindings(), 0);
	handle.teardown();
	assert_eq!(handle.state(), PatchState::TornDown);

	// Post-teardown edits reach nobody on a modern document.
	target.append_child(&Node::element("p")).unwrap();
	advance_settled(500).await;
	assert_eq!(instance.layout_passes(), 1);

	// The restored library can be wrapped again.
	let again = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(again.state(), PatchState::Installed);
	let (fresh_target, fresh) = mount_editor(&doc, &library);
	settle().await;
	fresh_target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(fresh.layout_passes(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropping_the_handle_leaves_the_patch_installed() {
	let (_scope, library, handle) = installed_patch().await;
	drop(handle);
	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;
	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(151).await;
	assert_eq!(instance.layout_passes(), 1);
	assert!(library.reflow().unwrap().is_wrapped());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn init_failures_propagate_and_skip_binding() {
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	let hooks = library.reflow().unwrap();
	hooks.set_init_fn(Arc::new(|_: &EditorInstance| {
		Err(EmbedError::Init("license check failed".into()))
	}));
	scope.bind_library("plume", library.clone());
	let handle = install(&scope, PatchConfig::default());
	settle().await;
	assert_eq!(handle.state(), PatchState::Installed);

	let err = library.mount_editor(&Node::element("editor")).unwrap_err();
	assert!(matches!(err, EmbedError::Init(_)));
	settle().await;
	assert_eq!(handle.live_bindings(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn an_init_that_binds_no_root_gets_no_binding() {
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	let hooks = library.reflow().unwrap();
	hooks.set_init_fn(Arc::new(|_: &EditorInstance| Ok(())));
	scope.bind_library("plume", library.clone());
	let handle = install(&scope, PatchConfig::default());
	settle().await;

	let instance = library.mount_editor(&Node::element("editor")).unwrap();
	settle().await;
	assert!(instance.root().is_none());
	assert_eq!(handle.live_bindings(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn bindings_end_when_the_instance_dies() {
	let (_scope, library, handle) = installed_patch().await;
	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;
	assert_eq!(handle.live_bindings(), 1);

	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	drop(instance);
	advance_settled(151).await;
	assert_eq!(handle.live_bindings(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn quiescence_window_is_configurable() {
	let scope = HostScope::new();
	let library = EditorLibrary::new();
	scope.bind_library("plume", library.clone());
	let _handle = install(
		&scope,
		PatchConfig::default().quiescence(Duration::from_millis(40)),
	);
	settle().await;
	let doc = Document::new();
	let (target, instance) = mount_editor(&doc, &library);
	settle().await;
	target.append_child(&Node::element("p")).unwrap();
	settle().await;
	advance_settled(39).await;
	assert_eq!(instance.layout_passes(), 0);
	advance_settled(2).await;
	assert_eq!(instance.layout_passes(), 1);
}
