use std::num::NonZeroU32;
use std::time::Duration;

use reflow_embed::AccessPath;

/// Default interval between library discovery attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default quiescence window: observed changes must stop for this long
/// before the coalesced update runs.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(150);

/// Export key the library is mounted under on stock hosts.
pub const LIBRARY_EXPORT: &str = "plume";

/// Wrapper scopes that re-export the library on stock hosts.
pub const WRAPPER_EXPORTS: [&str; 2] = ["tk", "toolkit"];

/// Tuning for one patch installation.
#[derive(Debug, Clone)]
pub struct PatchConfig {
	/// Interval between discovery attempts while the library is absent.
	pub poll_interval: Duration,
	/// Quiescence window for coalescing observed changes.
	pub quiescence: Duration,
	/// Cap on discovery attempts; `None` retries until the library appears.
	pub max_locate_attempts: Option<NonZeroU32>,
	/// Candidate access paths, probed in order. The first one that resolves
	/// wins.
	pub probe_paths: Vec<AccessPath>,
}

impl Default for PatchConfig {
	fn default() -> Self {
		Self {
			poll_interval: DEFAULT_POLL_INTERVAL,
			quiescence: DEFAULT_QUIESCENCE,
			max_locate_attempts: None,
			probe_paths: vec![
				AccessPath::direct(LIBRARY_EXPORT),
				AccessPath::wrapped(WRAPPER_EXPORTS[0], LIBRARY_EXPORT),
				AccessPath::wrapped(WRAPPER_EXPORTS[1], LIBRARY_EXPORT),
			],
		}
	}
}

impl PatchConfig {
	/// Replaces the discovery poll interval.
	#[must_use]
	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	/// Replaces the quiescence window.
	#[must_use]
	pub fn quiescence(mut self, window: Duration) -> Self {
		self.quiescence = window;
		self
	}

	/// Caps discovery at `attempts` probe passes. Zero means no cap.
	#[must_use]
	pub fn max_locate_attempts(mut self, attempts: u32) -> Self {
		self.max_locate_attempts = NonZeroU32::new(attempts);
		self
	}

	/// Replaces the candidate access paths.
	#[must_use]
	pub fn probe_paths(mut self, paths: Vec<AccessPath>) -> Self {
		self.probe_paths = paths;
		self
	}
}
