//! Attachment lifecycle and route tracking.
//!
//! ```text
//! Uninitialized ──start──▶ Discovering ──container found──▶ Attached
//!                              ▲                               │
//!                              └──── reset / detached ─────────┘
//! ```
//!
//! Discovery never polls: re-entry happens only when a change source fires.

use crate::dom::{Document, NodeId};
use crate::locator::Locator;
use crate::ui::Bar;
use tracing::debug;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Engine not started.
    #[default]
    Uninitialized,
    /// Looking for the container.
    Discovering,
    /// Container found; attachment-scoped sources are running.
    Attached,
}

impl LifecycleState {
    /// Lower-case name for reports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Discovering => "discovering",
            LifecycleState::Attached => "attached",
        }
    }
}

/// Node references held across passes. Each is a singleton or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Refs {
    /// Conversation container.
    pub container: Option<NodeId>,
    /// Thread (scroll) region.
    pub thread: Option<NodeId>,
    /// Scroll sentinel, first child of the thread region.
    pub sentinel: Option<NodeId>,
    /// Cutoff placeholder.
    pub placeholder: Option<NodeId>,
    /// Control bar.
    pub bar: Option<Bar>,
}

/// Lifecycle state plus the attachment references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    state: LifecycleState,
    refs: Refs,
}

impl Lifecycle {
    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current references.
    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// Mutable references (chrome bookkeeping).
    pub fn refs_mut(&mut self) -> &mut Refs {
        &mut self.refs
    }

    /// Locate container and thread, moving to `Attached` or `Discovering`.
    pub fn discover<D: Document + ?Sized>(&mut self, doc: &D, locator: &Locator) -> LifecycleState {
        let container = locator.find_container(doc);
        let thread = locator.find_thread(doc, container);
        self.refs.container = container;
        self.refs.thread = thread;
        self.state = if container.is_some() {
            LifecycleState::Attached
        } else {
            LifecycleState::Discovering
        };
        debug!(
            state = self.state.as_str(),
            ?container,
            ?thread,
            "discovery"
        );
        self.state
    }

    /// Drop attachment references and go back to discovering.
    ///
    /// The bar is body-mounted and survives; placeholder and sentinel are
    /// re-validated by the next pass.
    pub fn reset(&mut self) {
        self.refs.container = None;
        self.refs.thread = None;
        self.state = LifecycleState::Discovering;
    }

    /// Whether an attached container or thread left the document.
    pub fn is_detached<D: Document + ?Sized>(&self, doc: &D) -> bool {
        if self.state != LifecycleState::Attached {
            return false;
        }
        let gone = |node: Option<NodeId>| node.is_some_and(|n| !doc.is_connected(n));
        gone(self.refs.container) || gone(self.refs.thread)
    }
}

/// Last observed normalised path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteState {
    last_path: Option<String>,
}

impl RouteState {
    /// Record `path`. Returns whether it differs from a previously observed
    /// path; the first observation is not a change.
    pub fn observe(&mut self, path: &str) -> bool {
        match &self.last_path {
            Some(last) if last == path => false,
            Some(_) => {
                self.last_path = Some(path.to_string());
                true
            }
            None => {
                self.last_path = Some(path.to_string());
                false
            }
        }
    }

    /// Last observed path.
    pub fn path(&self) -> Option<&str> {
        self.last_path.as_deref()
    }
}
