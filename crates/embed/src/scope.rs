use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::library::EditorLibrary;

/// Ordered key sequence probed against a [`HostScope`].
///
/// Stock hosts expose the library either as a top-level export or through a
/// wrapper scope, so most paths are one or two keys deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath {
	keys: Vec<String>,
}

impl AccessPath {
	pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			keys: keys.into_iter().map(Into::into).collect(),
		}
	}

	/// Path through a single top-level export.
	pub fn direct(name: impl Into<String>) -> Self {
		Self::new([name.into()])
	}

	/// Path through a wrapper scope's export.
	pub fn wrapped(wrapper: impl Into<String>, name: impl Into<String>) -> Self {
		Self::new([wrapper.into(), name.into()])
	}

	pub fn keys(&self) -> &[String] {
		&self.keys
	}
}

impl fmt::Display for AccessPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.keys.join("."))
	}
}

#[derive(Clone)]
enum ScopeValue {
	Library(EditorLibrary),
	Scope(HostScope),
}

/// Named export table of the host environment.
///
/// The host mounts values at its own pace; consumers that need an export
/// before it exists must poll. Handles are cheap clones of the same table.
#[derive(Clone, Default)]
pub struct HostScope {
	slots: Arc<RwLock<HashMap<String, ScopeValue>>>,
}

impl HostScope {
	pub fn new() -> Self {
		Self::default()
	}

	/// Mounts a library under `key`, replacing any previous value.
	pub fn bind_library(&self, key: impl Into<String>, library: EditorLibrary) {
		let key = key.into();
		tracing::debug!(key, "embed.scope.bind_library");
		self.slots.write().insert(key, ScopeValue::Library(library));
	}

	/// Mounts a nested wrapper scope under `key`, replacing any previous
	/// value.
	pub fn bind_scope(&self, key: impl Into<String>, scope: HostScope) {
		let key = key.into();
		tracing::debug!(key, "embed.scope.bind_scope");
		self.slots.write().insert(key, ScopeValue::Scope(scope));
	}

	/// Removes the export under `key`. Returns `false` if it was absent.
	pub fn unbind(&self, key: &str) -> bool {
		self.slots.write().remove(key).is_some()
	}

	/// Resolves one candidate access path to a library.
	///
	/// Missing keys, non-scope intermediates, and non-library leaves all
	/// resolve to `None`; the caller is expected to try its next candidate.
	pub fn resolve(&self, path: &AccessPath) -> Option<EditorLibrary> {
		let (last, prefix) = path.keys().split_last()?;
		let mut scope = self.clone();
		for key in prefix {
			let next = {
				let slots = scope.slots.read();
				match slots.get(key) {
					Some(ScopeValue::Scope(nested)) => nested.clone(),
					_ => return None,
				}
			};
			scope = next;
		}
		let slots = scope.slots.read();
		match slots.get(last) {
			Some(ScopeValue::Library(library)) => Some(library.clone()),
			_ => None,
		}
	}
}
