//! Coalesced re-layout patch for the embedded editing library.
//!
//! The library wires re-layout to deprecated synchronous mutation events;
//! modern hosts no longer deliver those, so layout silently goes stale.
//! [`install`] repairs this from the outside, without forking the library:
//!
//! 1. Discovery polls the configured access paths until the library shows up
//!    in the host scope. Absence is expected early in host startup and is
//!    retried, not failed.
//! 2. Installation claims the library's one-time wrap latch and swaps both
//!    entry points at once: the update strategy gains the reentrancy guard,
//!    the init strategy additionally attaches an observation binding to each
//!    freshly mounted instance. A second install finds the latch taken and
//!    becomes a no-op.
//! 3. Each binding coalesces bursts of child-list changes behind a
//!    quiescence window and then runs the instance's update entry point
//!    once, skipping instances that are mid-update or detached.
//! 4. The guarded update suppresses reentrant invocations and swallows
//!    errors and panics, clearing the activity flag on every exit path.
//!
//! Nothing here surfaces as a host error: at worst the editor keeps the
//! library's stock behavior. Progress is observable through
//! [`PatchHandle::state`], and [`PatchHandle::teardown`] restores the
//! original entry points.

mod config;
mod error;
mod guard;
mod install;
mod locate;
mod observe;
mod runtime;

pub use config::{
	DEFAULT_POLL_INTERVAL, DEFAULT_QUIESCENCE, LIBRARY_EXPORT, PatchConfig, WRAPPER_EXPORTS,
};
pub use error::PatchError;
pub use install::{PatchHandle, PatchState, install};
