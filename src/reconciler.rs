//! Applying a window to the document.
//!
//! Every write here is conditional on the document differing from the
//! target state, so running the same step twice writes nothing the second
//! time. The pass-level suppression in [`Reconciler::apply`] additionally
//! skips visibility and placeholder work when `(total, hidden_top)` equals
//! the previous pass.

use crate::dom::{Document, NodeId};
use crate::lifecycle::Refs;
use crate::locator::Locator;
use crate::model::{AppliedSnapshot, Settings, WindowState};
use crate::ui::{create_placeholder, create_sentinel, placeholder_label, status_text, Bar};
use std::ops::Range;
use tracing::{debug, trace};

/// Result of [`Reconciler::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// Same `(total, hidden_top)` as the previous pass; only status refreshed.
    Suppressed,
    /// Visibility and placeholder were brought in line.
    Written {
        /// Entries whose visibility flipped.
        toggled: usize,
    },
}

/// Chrome changes made by [`ensure_chrome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChromeChange {
    /// The bar was created or re-attached.
    pub bar_attached: bool,
    /// The bar was removed (left a conversation route).
    pub bar_removed: bool,
    /// A new sentinel was inserted; its observer must be re-registered.
    pub sentinel_replaced: bool,
}

/// Write-side state carried between passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciler {
    last_applied: Option<AppliedSnapshot>,
}

impl Reconciler {
    /// Snapshot of the previous write pass.
    pub fn last_applied(&self) -> Option<AppliedSnapshot> {
        self.last_applied
    }

    /// Forget the previous pass (route reset).
    pub fn forget(&mut self) {
        self.last_applied = None;
    }

    /// Bring entry visibility and the placeholder in line with `window`, then
    /// refresh the status readout.
    pub fn apply<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        refs: &mut Refs,
        entries: &[NodeId],
        scope: NodeId,
        window: &WindowState,
        settings: &Settings,
    ) -> ApplyResult {
        let snapshot = window.snapshot();
        let result = if self.last_applied == Some(snapshot) {
            trace!(?snapshot, "state unchanged, writes suppressed");
            ApplyResult::Suppressed
        } else {
            let toggled = apply_visibility(doc, entries, window.hidden_top());
            sync_placeholder(doc, refs, entries, scope, window.hidden_top(), settings.batch());
            self.last_applied = Some(snapshot);
            ApplyResult::Written { toggled }
        };
        update_status(doc, refs, window.visible_count(), window.total());
        result
    }
}

/// Hide entries before `hidden_top`, show the rest. Returns writes issued.
pub fn apply_visibility<D: Document + ?Sized>(
    doc: &mut D,
    entries: &[NodeId],
    hidden_top: usize,
) -> usize {
    let mut toggled = 0;
    for (index, &entry) in entries.iter().enumerate() {
        let hide = index < hidden_top;
        if doc.is_hidden(entry) != hide {
            doc.set_hidden(entry, hide);
            toggled += 1;
        }
    }
    toggled
}

/// Show the entries in `range` without touching the others.
pub fn reveal_range<D: Document + ?Sized>(doc: &mut D, entries: &[NodeId], range: Range<usize>) {
    let end = range.end.min(entries.len());
    let start = range.start.min(end);
    for &entry in &entries[start..end] {
        if doc.is_hidden(entry) {
            doc.set_hidden(entry, false);
        }
    }
}

/// Keep exactly one placeholder, present iff `hidden_top > 0`.
///
/// The node is reused across passes. It sits immediately before the first
/// visible entry, or at the end of `scope` if that entry is missing.
pub fn sync_placeholder<D: Document + ?Sized>(
    doc: &mut D,
    refs: &mut Refs,
    entries: &[NodeId],
    scope: NodeId,
    hidden_top: usize,
    batch_size: usize,
) {
    if hidden_top == 0 {
        if let Some(placeholder) = refs.placeholder {
            if doc.parent(placeholder).is_some() {
                debug!("removing placeholder");
                doc.remove(placeholder);
            }
        }
        return;
    }

    let placeholder = match refs.placeholder {
        Some(node) => node,
        None => {
            let node = create_placeholder(doc);
            refs.placeholder = Some(node);
            node
        }
    };

    match entries.get(hidden_top) {
        Some(&first_visible) => {
            let in_place = doc.parent(placeholder).is_some()
                && doc.next_sibling(placeholder) == Some(first_visible);
            if !in_place {
                trace!(before = hidden_top, "positioning placeholder");
                doc.insert_before(first_visible, placeholder);
            }
        }
        None => {
            let last = doc.children(scope).last().copied();
            if last != Some(placeholder) {
                doc.append_child(scope, placeholder);
            }
        }
    }

    let label = placeholder_label(hidden_top, batch_size);
    if doc.text(placeholder) != Some(label.as_str()) {
        doc.set_text(placeholder, &label);
    }
}

/// Write `visible V/T` into the bar, if there is one.
pub fn update_status<D: Document + ?Sized>(doc: &mut D, refs: &Refs, visible: usize, total: usize) {
    if let Some(bar) = &refs.bar {
        bar.set_status(doc, &status_text(visible, total));
    }
}

/// Create, re-attach or remove the bar and sentinel for the current route.
///
/// Both exist only on conversation routes. The bar lives on the body; the
/// sentinel is the first child of the thread region and only exists with
/// autoload enabled.
pub fn ensure_chrome<D: Document + ?Sized>(
    doc: &mut D,
    refs: &mut Refs,
    locator: &Locator,
    path: &str,
    settings: &Settings,
) -> ChromeChange {
    let mut change = ChromeChange::default();
    if !locator.is_conversation_route(path) {
        if let Some(bar) = refs.bar.take() {
            if bar.is_connected(doc) {
                doc.remove(bar.root);
            }
            debug!(%path, "not a conversation route, bar removed");
            change.bar_removed = true;
        }
        return change;
    }

    let mount = doc.body().unwrap_or_else(|| doc.root());
    match refs.bar {
        None => {
            let bar = Bar::create(doc);
            doc.append_child(mount, bar.root);
            refs.bar = Some(bar);
            debug!("bar created");
            change.bar_attached = true;
        }
        Some(bar) if !bar.is_connected(doc) => {
            doc.append_child(mount, bar.root);
            debug!("bar re-attached");
            change.bar_attached = true;
        }
        Some(_) => {}
    }

    if let (Some(thread), true) = (refs.thread, settings.autoload_on_scroll) {
        let current = refs
            .sentinel
            .filter(|&s| doc.parent(s) == Some(thread) && doc.is_connected(s));
        if current.is_none() {
            if let Some(stale) = refs.sentinel {
                if doc.parent(stale).is_some() {
                    doc.remove(stale);
                }
            }
            let sentinel = create_sentinel(doc);
            doc.prepend_child(thread, sentinel);
            refs.sentinel = Some(sentinel);
            debug!("sentinel created");
            change.sentinel_replaced = true;
        }
    }
    change
}
