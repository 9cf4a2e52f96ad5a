//! Visibility window over the ordered entry list.
//!
//! The window is always a suffix of the entries: the oldest `hidden_top`
//! entries are hidden, everything after them is shown. All transitions are
//! pure functions of the current state, the observed entry count and the
//! settings, so they are testable without a document.
//!
//! # Policies
//!
//! - [`WindowPolicy::FixedThreshold`]: clamp `hidden_top` so at least
//!   `threshold` entries stay visible, otherwise leave it alone (manual
//!   reveals survive incidental re-renders).
//! - [`WindowPolicy::Growth`]: keep exactly `visible_limit` newest entries
//!   visible; the limit starts at `threshold` and only grows through reveals.
//!
//! # Invariants
//! - `0 <= hidden_top <= total`
//! - `hidden_bottom == 0`

use super::settings::Settings;
use std::ops::Range;

/// Windowing policy, selected by `hideOldestOnNew`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// `hideOldestOnNew = false`.
    FixedThreshold,
    /// `hideOldestOnNew = true`.
    Growth,
}

impl WindowPolicy {
    /// Policy selected by the settings.
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.hide_oldest_on_new {
            WindowPolicy::Growth
        } else {
            WindowPolicy::FixedThreshold
        }
    }
}

/// `(total, hidden_top)` written by the previous reconciliation pass.
///
/// Only used to suppress redundant writes; never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedSnapshot {
    /// Entry count at the time of the write.
    pub total: usize,
    /// Hidden prefix length at the time of the write.
    pub hidden_top: usize,
}

/// Windowing state for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    total: usize,
    hidden_top: usize,
    hidden_bottom: usize,
    visible_limit: usize,
    /// A pass observed zero entries; the next non-empty pass is a (re)load.
    saw_zero: bool,
    /// A pass has observed entries since construction or reset.
    primed: bool,
}

impl WindowState {
    /// Fresh window for a route: nothing hidden, `visible_limit = max_visible`.
    pub fn new(max_visible: usize) -> Self {
        Self {
            total: 0,
            hidden_top: 0,
            hidden_bottom: 0,
            visible_limit: max_visible.max(1),
            saw_zero: false,
            primed: false,
        }
    }

    /// Replace the state wholesale, as on navigation.
    pub fn reset(&mut self, max_visible: usize) {
        *self = Self::new(max_visible);
    }

    /// Entries discovered by the latest pass or action.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Oldest entries currently hidden.
    pub fn hidden_top(&self) -> usize {
        self.hidden_top
    }

    /// Always zero; no bottom-hiding policy exists.
    pub fn hidden_bottom(&self) -> usize {
        self.hidden_bottom
    }

    /// Growth-policy ceiling on visible entries.
    pub fn visible_limit(&self) -> usize {
        self.visible_limit
    }

    /// Entries currently inside the window.
    pub fn visible_count(&self) -> usize {
        self.total - self.hidden_top
    }

    /// Whether the last pass observed an empty list.
    pub fn saw_zero(&self) -> bool {
        self.saw_zero
    }

    /// Whether every entry is visible.
    pub fn is_fully_revealed(&self) -> bool {
        self.hidden_top == 0
    }

    /// The snapshot a write pass would record.
    pub fn snapshot(&self) -> AppliedSnapshot {
        AppliedSnapshot {
            total: self.total,
            hidden_top: self.hidden_top,
        }
    }

    /// Windowing step of a reconciliation pass that discovered `total` entries.
    ///
    /// An empty list arms the zero-to-nonzero detector; the first non-empty
    /// pass after it (or after construction/reset) force-collapses the window
    /// to `threshold` regardless of policy.
    pub fn observe(&mut self, total: usize, settings: &Settings) {
        self.total = total;
        if total == 0 {
            self.hidden_top = 0;
            self.saw_zero = true;
            return;
        }

        let threshold = settings.threshold();
        let bound = total.saturating_sub(threshold);
        match WindowPolicy::from_settings(settings) {
            WindowPolicy::FixedThreshold => {
                if self.hidden_top + threshold > total {
                    self.hidden_top = bound;
                } else {
                    self.hidden_top = self.hidden_top.min(bound);
                }
            }
            WindowPolicy::Growth => {
                self.visible_limit = self.visible_limit.max(threshold);
                self.hidden_top = total.saturating_sub(self.visible_limit);
            }
        }

        if self.saw_zero || !self.primed {
            self.saw_zero = false;
            self.hidden_top = bound;
            if WindowPolicy::from_settings(settings) == WindowPolicy::Growth {
                self.visible_limit = threshold;
            }
        }
        self.primed = true;
    }

    /// Reveal one batch of older entries.
    ///
    /// `total` is the entry count discovered for this action. Returns the
    /// index range that just became visible, for the optimistic DOM update.
    pub fn reveal_older(&mut self, total: usize, settings: &Settings) -> Range<usize> {
        self.sync_total(total);
        let before = self.hidden_top;
        self.hidden_top = before.saturating_sub(settings.batch());
        if WindowPolicy::from_settings(settings) == WindowPolicy::Growth {
            self.visible_limit += before - self.hidden_top;
        }
        self.hidden_top..before
    }

    /// Collapse the window back to `threshold` newest entries.
    pub fn collapse(&mut self, total: usize, settings: &Settings) {
        self.sync_total(total);
        let threshold = settings.threshold();
        self.hidden_top = total.saturating_sub(threshold);
        if WindowPolicy::from_settings(settings) == WindowPolicy::Growth {
            self.visible_limit = threshold;
        }
    }

    fn sync_total(&mut self, total: usize) {
        self.total = total;
        self.hidden_top = self.hidden_top.min(total);
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
