//! Host document model for the editor reflow patch.
//!
//! [`Node`] is a cheaply cloneable handle to one element of a host document
//! tree. Edits to a node's direct child list are reported through two
//! mechanisms:
//!
//! - [`Node::observe_children`] hands out an asynchronous subscription that
//!   delivers one [`ChildListChange`] batch per tree edit, on the
//!   subscriber's schedule rather than inline with the mutating call.
//! - [`Node::hook_child_mutations`] registers a callback in the deprecated
//!   synchronous flavor, invoked during the mutating call itself. It only
//!   fires on documents built with [`Document::with_legacy_mutation_events`];
//!   a modern [`Document`] accepts the registration and never invokes it,
//!   which is the host behavior that strands code still relying on it.
//!
//! Observation is scoped to direct child additions and removals. Attribute
//! and text edits notify nobody.

mod document;
mod node;
mod observe;

pub use document::Document;
pub use node::{Node, NodeId};
pub use observe::{ChildListChange, ChildListObserver, LegacyHookId};

/// Errors from host document tree edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DomError {
	/// Appending would make a node its own ancestor.
	#[error("appending node {child} under {parent} would create a cycle")]
	WouldCycle { parent: NodeId, child: NodeId },
	/// The node is not a direct child of the parent it was removed from.
	#[error("node {child} is not a child of {parent}")]
	NotAChild { parent: NodeId, child: NodeId },
}
