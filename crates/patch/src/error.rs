/// Failures recorded by discovery and installation.
///
/// These never propagate to the host. They surface through
/// [`PatchHandle::failure`](crate::PatchHandle::failure) next to the matching
/// [`PatchState`](crate::PatchState) transition.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum PatchError {
	/// The located library does not carry the expected reflow construct.
	#[error("library is structurally incompatible: {reason}")]
	Incompatible { reason: String },
	/// Discovery exhausted its attempt cap with the library still absent.
	#[error("library discovery gave up after {attempts} attempts")]
	GaveUp { attempts: u32 },
}
