use reflow_embed::{EditorLibrary, HostScope};

use crate::install::PatchShared;

/// Outcome of the discovery loop.
pub(crate) enum LocateOutcome {
	/// A candidate access path resolved to the library.
	Found(EditorLibrary),
	/// The attempt cap was reached with the library still absent.
	GaveUp { attempts: u32 },
	/// Teardown stopped discovery.
	Cancelled,
}

/// Polls the configured access paths until the library appears.
///
/// All candidates are probed in order on every attempt and the first hit
/// wins. An absent library is expected while the host is still loading, so
/// a miss only schedules the next attempt; without an attempt cap this loop
/// runs until found or cancelled.
pub(crate) async fn run(scope: &HostScope, shared: &PatchShared) -> LocateOutcome {
	let config = &shared.config;
	let mut attempts: u32 = 0;
	loop {
		attempts = attempts.saturating_add(1);
		for path in &config.probe_paths {
			if let Some(library) = scope.resolve(path) {
				tracing::debug!(path = %path, attempts, "patch.locate.found");
				return LocateOutcome::Found(library);
			}
		}
		if let Some(cap) = config.max_locate_attempts
			&& attempts >= cap.get()
		{
			tracing::warn!(attempts, "patch.locate.gave_up");
			return LocateOutcome::GaveUp { attempts };
		}
		tracing::trace!(attempts, "patch.locate.miss");
		tokio::select! {
			_ = shared.cancel.cancelled() => return LocateOutcome::Cancelled,
			_ = tokio::time::sleep(config.poll_interval) => {}
		}
	}
}
