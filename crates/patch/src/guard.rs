use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use reflow_embed::{EditorInstance, UpdateFn};

/// Decorates the update entry point with the per-instance activity guard.
///
/// A call that finds the instance's update already in progress returns
/// without invoking the original. Errors and panics from the original are
/// reported and swallowed, and the activity flag is cleared on every exit
/// path, so one bad layout pass cannot wedge the instance.
pub(crate) fn guarded_update(original: Arc<UpdateFn>) -> Arc<UpdateFn> {
	Arc::new(move |instance: &EditorInstance| {
		if !instance.begin_update() {
			tracing::trace!(instance = instance.id().0, "patch.update.reentry_suppressed");
			return Ok(());
		}
		let _reset = ClearActivity(instance);
		match panic::catch_unwind(AssertUnwindSafe(|| (original)(instance))) {
			Ok(Ok(())) => Ok(()),
			Ok(Err(error)) => {
				tracing::warn!(
					instance = instance.id().0,
					error = ?error,
					"patch.update.error_swallowed"
				);
				Ok(())
			}
			Err(_) => {
				tracing::warn!(instance = instance.id().0, "patch.update.panic_swallowed");
				Ok(())
			}
		}
	})
}

/// Clears the activity flag when the guarded call returns or unwinds.
struct ClearActivity<'a>(&'a EditorInstance);

impl Drop for ClearActivity<'_> {
	fn drop(&mut self) {
		self.0.finish_update();
	}
}
