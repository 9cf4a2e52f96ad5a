//! Document interface.
//!
//! The host owns the document; this crate only reads it and issues a small
//! set of writes (visibility toggles, marker elements, text). Everything the
//! engine needs from the host is expressed by the [`Document`] trait:
//!
//! - read primitives (tag, attributes, tree links, text, geometry)
//! - writes (create/insert/remove elements, text, visibility, position, scroll)
//! - observation (mutation and intersection observers, navigation)
//!
//! Observations are not callbacks. The host delivers them later as
//! [`HostEvent`]s, which keeps every handler a plain `&mut self` call on the
//! single host execution sequence.
//!
//! # Module Structure
//!
//! - `pattern`: structural match patterns evaluated over any `Document`
//! - `memory`: arena-backed in-memory host used by tests and the simulator

pub mod memory;
pub mod pattern;

pub use memory::{MemoryDocument, WriteStats};
pub use pattern::{Pattern, PatternError};

use crate::model::settings::SettingsChange;
use std::cmp::Ordering;
use thiserror::Error;

/// Opaque handle to a host node.
///
/// The host owns node lifetime; a handle may outlive its node, in which case
/// read primitives answer `None`/`false` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Wrap a raw host handle.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw host handle.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Handle of a registered observer (mutation or intersection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u32);

impl ObserverId {
    /// Wrap a raw host observer handle.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw host observer handle.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Host refused or lacks an observation API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    /// The host does not provide this kind of observation.
    #[error("{0} observation is not supported by the host")]
    Unsupported(&'static str),

    /// The observation target is not connected to the document.
    #[error("observation target {0:?} is not connected")]
    Detached(NodeId),
}

/// Host refused a document write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The node is unknown or no longer connected.
    #[error("node {0:?} is not connected")]
    Detached(NodeId),

    /// The operation is not supported by the host.
    #[error("{0} is not supported by the host")]
    Unsupported(&'static str),
}

/// Axis-aligned rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// Viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// Which structural changes a mutation observer reports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationOptions {
    /// Report insertion/removal of children.
    pub child_list: bool,
    /// Report changes below the target, not just on it.
    pub subtree: bool,
    /// Report attribute changes, restricted to these names (empty = none).
    pub attribute_filter: Vec<String>,
}

impl MutationOptions {
    /// Child-list changes anywhere in the target's subtree.
    pub fn subtree_child_list() -> Self {
        Self {
            child_list: true,
            subtree: true,
            attribute_filter: Vec::new(),
        }
    }

    /// Add attribute reporting for the given names.
    pub fn with_attributes(mut self, names: &[&str]) -> Self {
        self.attribute_filter = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// Kind of one mutation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were inserted or removed.
    ChildList,
    /// An attribute changed.
    Attribute(String),
}

/// One reported structural change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// What changed.
    pub kind: MutationKind,
    /// The node whose children or attribute changed.
    pub target: NodeId,
}

/// How a navigation happened. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Programmatic history push.
    Push,
    /// Programmatic history replace.
    Replace,
    /// Back/forward navigation.
    Pop,
}

/// A route change reported by the host's navigation subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    /// How the navigation happened.
    pub kind: NavigationKind,
    /// New location (absolute URL or path).
    pub location: String,
}

/// Pointer phase for drag handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Button/touch pressed.
    Down,
    /// Pointer moved.
    Move,
    /// Button/touch released.
    Up,
}

/// A pointer event in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Phase.
    pub phase: PointerPhase,
    /// Node under the pointer when pressed.
    pub target: NodeId,
    /// Viewport x.
    pub x: f64,
    /// Viewport y.
    pub y: f64,
}

/// Everything the host can tell the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A batch of records for one mutation observer.
    Mutations {
        /// Observer the records belong to.
        observer: ObserverId,
        /// Records in the order they happened.
        records: Vec<MutationRecord>,
    },
    /// Intersection change for an observed node.
    Intersection {
        /// Observer the change belongs to.
        observer: ObserverId,
        /// Whether the node now intersects the viewport.
        intersecting: bool,
    },
    /// Route change.
    Navigation(NavigationEvent),
    /// Settings-store change notification.
    SettingsChanged(SettingsChange),
    /// Click on a node.
    Click(NodeId),
    /// Pointer activity (drag handle).
    Pointer(PointerEvent),
    /// The tick previously requested from the tick source has arrived.
    Tick,
}

/// Host document as seen by the engine.
///
/// Required methods are the host's primitives; provided methods are derived
/// from them and may be overridden with native equivalents.
pub trait Document {
    /// The document element.
    fn root(&self) -> NodeId;

    /// The body element, if present.
    fn body(&self) -> Option<NodeId>;

    /// Lower-case tag name, `None` for unknown nodes.
    fn tag(&self, node: NodeId) -> Option<&str>;

    /// Attribute value.
    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Parent node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Children in document order.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Text content set through [`Document::set_text`].
    fn text(&self, node: NodeId) -> Option<&str>;

    /// Whether the node is hidden by this crate's visibility toggle.
    fn is_hidden(&self, node: NodeId) -> bool;

    /// Current location (path, or absolute URL).
    fn location(&self) -> String;

    /// Bounding rectangle of a node.
    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Viewport size.
    fn viewport(&self) -> Viewport;

    /// Whether the node's content is taller than its visible box.
    fn is_scrollable(&self, node: NodeId) -> bool;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Set an attribute.
    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);

    /// Append `child` as the last child of `parent`, moving it if attached.
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `child` as the first child of `parent`, moving it if attached.
    fn prepend_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `node` immediately before `reference`, moving it if attached.
    fn insert_before(&mut self, reference: NodeId, node: NodeId);

    /// Detach a node from its parent.
    fn remove(&mut self, node: NodeId);

    /// Replace the text content of a node.
    fn set_text(&mut self, node: NodeId, text: &str);

    /// Toggle visibility.
    fn set_hidden(&mut self, node: NodeId, hidden: bool);

    /// Move a node to absolute viewport coordinates.
    fn set_position(&mut self, node: NodeId, left: f64, top: f64);

    /// Scroll a node to its bottom edge.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the host cannot scroll the node.
    fn scroll_to_bottom(&mut self, node: NodeId) -> Result<(), DocumentError>;

    /// Register a mutation observer on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] when the host refuses the registration.
    fn observe_mutations(
        &mut self,
        target: NodeId,
        options: &MutationOptions,
    ) -> Result<ObserverId, ObserveError>;

    /// Register a viewport-intersection observer on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] when the host refuses the registration.
    fn observe_intersection(&mut self, target: NodeId) -> Result<ObserverId, ObserveError>;

    /// Subscribe to history push/replace and back/forward navigation.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] when the host cannot report navigation.
    fn subscribe_navigation(&mut self) -> Result<(), ObserveError>;

    /// Stop an observer. Unknown handles are ignored.
    fn disconnect(&mut self, observer: ObserverId);

    /// Whether a class is present in the `class` attribute.
    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    /// Whether the node is attached to the document.
    fn is_connected(&self, node: NodeId) -> bool {
        let root = self.root();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Inclusive containment: `node` is `ancestor` or below it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// The node immediately after `node` under the same parent.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&n| n == node)?;
        siblings.get(index + 1).copied()
    }

    /// Document (pre-order traversal) order of two nodes.
    fn compare_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        tree_path(self, a).cmp(&tree_path(self, b))
    }

    /// All descendants of `scope` (excluding `scope`) matching `pattern`, in
    /// document order.
    fn query_all(&self, scope: NodeId, pattern: &Pattern) -> Vec<NodeId> {
        pattern::descendants(self, scope)
            .into_iter()
            .filter(|&node| pattern.matches(self, node))
            .collect()
    }

    /// First descendant of `scope` matching `pattern`.
    fn query_first(&self, scope: NodeId, pattern: &Pattern) -> Option<NodeId> {
        pattern::descendants(self, scope)
            .into_iter()
            .find(|&node| pattern.matches(self, node))
    }
}

/// Child-index path from the top-most ancestor down to `node`.
///
/// Lexicographic comparison of two paths yields pre-order document order: an
/// ancestor's path is a prefix of its descendants' paths and sorts first.
fn tree_path<D: Document + ?Sized>(doc: &D, node: NodeId) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        let index = doc
            .children(parent)
            .iter()
            .position(|&n| n == current)
            .unwrap_or(usize::MAX);
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}
