//! Model of the embedded rich-text editing library and its host scope.
//!
//! The host mounts an [`EditorLibrary`] into a [`HostScope`] under one or
//! more export keys, either directly or inside a wrapper scope. The library
//! carries one internal scroll/reflow construct, [`ReflowHooks`], holding its
//! two entry points as swappable strategy slots:
//!
//! - the *init* entry point runs once per [`EditorInstance`] right after
//!   construction and binds the instance's root node;
//! - the *update* entry point recomputes layout for one instance.
//!
//! Both slots are resolved at invocation time. Code that replaces a slot
//! therefore also covers calls issued from the library's own paths, which is
//! what makes the construct patchable from outside.
//!
//! The stock init wires re-layout to the deprecated synchronous mutation
//! events of [`reflow_dom`]. On hosts that no longer deliver those events the
//! wiring stays silent and layout goes stale; fixing that from the outside is
//! the whole point of the patch crate sitting on top of this one.

mod instance;
mod library;
mod scope;

pub use instance::{EditorInstance, InstanceId, WeakEditorInstance};
pub use library::{EditorLibrary, InitFn, ReflowHooks, UpdateFn, WeakReflowHooks};
pub use scope::{AccessPath, HostScope};

/// Errors surfaced by library entry points.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum EmbedError {
	/// The init entry point rejected the instance.
	#[error("editor init failed: {0}")]
	Init(String),
	/// The update entry point could not complete a layout pass.
	#[error("editor update failed: {0}")]
	Update(String),
	/// The instance has no bound root node.
	#[error("no root node bound to this editor instance")]
	RootUnbound,
}
