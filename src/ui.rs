//! Chrome written into the host document: control bar, cutoff placeholder,
//! scroll sentinel, and the bar's drag state.

use crate::dom::{Document, NodeId};

/// Class of the control bar root.
pub const BAR_CLASS: &str = "chatwin-bar";
/// Class of the cutoff placeholder.
pub const PLACEHOLDER_CLASS: &str = "chatwin-placeholder";
/// Class of the scroll sentinel.
pub const SENTINEL_CLASS: &str = "chatwin-sentinel";
/// Margin kept between a dragged bar and the viewport edge.
pub const DRAG_MARGIN: f64 = 4.0;

/// Placeholder text for `hidden` older entries.
pub fn placeholder_label(hidden: usize, batch_size: usize) -> String {
    let plural = if hidden == 1 { "" } else { "s" };
    format!("{hidden} older message{plural} hidden — click to load next {batch_size}")
}

/// Status readout text.
pub fn status_text(visible: usize, total: usize) -> String {
    format!("visible {visible}/{total}")
}

/// What a click or press on the bar hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarControl {
    /// "Show older" button.
    ShowOlder,
    /// "Collapse" button.
    Collapse,
    /// Drag handle.
    Handle,
}

/// Node handles of the control bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    /// Outer element, mounted on the body.
    pub root: NodeId,
    /// Movable pill inside the root.
    pub pill: NodeId,
    /// Status readout.
    pub status: NodeId,
    /// "Show older" button.
    pub show_older: NodeId,
    /// "Collapse" button.
    pub collapse: NodeId,
    /// Drag handle.
    pub handle: NodeId,
}

impl Bar {
    /// Build a detached bar.
    pub fn create<D: Document + ?Sized>(doc: &mut D) -> Self {
        let root = doc.create_element("div");
        doc.set_attr(root, "class", BAR_CLASS);
        let pill = doc.create_element("div");
        doc.set_attr(pill, "class", "chatwin-pill");

        let status = doc.create_element("span");
        doc.set_attr(status, "class", "chatwin-status");
        doc.set_text(status, "chatwin active");

        let show_older = doc.create_element("button");
        doc.set_attr(show_older, "title", "Show older messages");
        doc.set_text(show_older, "Show older");

        let collapse = doc.create_element("button");
        doc.set_attr(collapse, "title", "Collapse older messages");
        doc.set_text(collapse, "Collapse");

        let handle = doc.create_element("span");
        doc.set_attr(handle, "class", "chatwin-drag-handle");
        doc.set_attr(handle, "title", "Drag");

        for child in [status, show_older, collapse, handle] {
            doc.append_child(pill, child);
        }
        doc.append_child(root, pill);
        Self {
            root,
            pill,
            status,
            show_older,
            collapse,
            handle,
        }
    }

    /// Whether the bar is attached to the document.
    pub fn is_connected<D: Document + ?Sized>(&self, doc: &D) -> bool {
        doc.is_connected(self.root)
    }

    /// Which control, if any, contains `node`.
    pub fn control_at<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> Option<BarControl> {
        if doc.contains(self.show_older, node) {
            Some(BarControl::ShowOlder)
        } else if doc.contains(self.collapse, node) {
            Some(BarControl::Collapse)
        } else if doc.contains(self.handle, node) {
            Some(BarControl::Handle)
        } else {
            None
        }
    }

    /// Set the status text, skipping the write when unchanged.
    pub fn set_status<D: Document + ?Sized>(&self, doc: &mut D, text: &str) {
        if doc.text(self.status) != Some(text) {
            doc.set_text(self.status, text);
        }
    }
}

/// Build a detached placeholder.
pub fn create_placeholder<D: Document + ?Sized>(doc: &mut D) -> NodeId {
    let node = doc.create_element("div");
    doc.set_attr(node, "class", PLACEHOLDER_CLASS);
    node
}

/// Build a detached zero-size sentinel.
pub fn create_sentinel<D: Document + ?Sized>(doc: &mut D) -> NodeId {
    let node = doc.create_element("div");
    doc.set_attr(node, "class", SENTINEL_CLASS);
    node
}

/// Drag state of the bar's pill.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    /// Not dragging.
    #[default]
    Idle,
    /// Pointer held on the handle.
    Dragging {
        /// Pointer x minus pill left at press time.
        offset_x: f64,
        /// Pointer y minus pill top at press time.
        offset_y: f64,
    },
}

impl DragState {
    /// Whether a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }

    /// Press on the handle: pin the pill at its current rectangle.
    pub fn begin<D: Document + ?Sized>(&mut self, doc: &mut D, bar: &Bar, x: f64, y: f64) {
        let rect = doc.bounding_rect(bar.pill);
        doc.set_position(bar.pill, rect.left, rect.top);
        *self = DragState::Dragging {
            offset_x: x - rect.left,
            offset_y: y - rect.top,
        };
    }

    /// Pointer moved: reposition, clamped to the viewport.
    ///
    /// Returns the new `(left, top)`, or `None` when not dragging.
    pub fn update<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        bar: &Bar,
        x: f64,
        y: f64,
    ) -> Option<(f64, f64)> {
        let DragState::Dragging { offset_x, offset_y } = *self else {
            return None;
        };
        let viewport = doc.viewport();
        let rect = doc.bounding_rect(bar.pill);
        let left = clamp(
            x - offset_x,
            DRAG_MARGIN,
            viewport.width - rect.width - DRAG_MARGIN,
        );
        let top = clamp(
            y - offset_y,
            DRAG_MARGIN,
            viewport.height - rect.height - DRAG_MARGIN,
        );
        doc.set_position(bar.pill, left, top);
        Some((left, top))
    }

    /// Release.
    pub fn end(&mut self) {
        *self = DragState::Idle;
    }
}

/// `min(max(value, lo), hi)`; `hi` wins when the range is inverted.
fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}
