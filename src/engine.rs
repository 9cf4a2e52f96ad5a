//! The engine: one explicit context object owning every component.
//!
//! Host events go in through [`Engine::handle`]; the engine never calls back
//! into the host except through the [`Document`] it owns and the
//! [`TickSource`] it was given. Everything runs on the caller's thread, one
//! event at a time.
//!
//! # Flow
//!
//! 1. A change source turns a host event into [`Signal`]s.
//! 2. Signals request a pass from the [`Scheduler`], or act immediately
//!    (re-attach, route reset, batch reveal, bar restore).
//! 3. The next [`HostEvent::Tick`] runs one reconciliation pass over live
//!    document and settings state.

use crate::config::store::{MemoryStore, SettingsStore};
use crate::detect::{normalize_path, ChangeDetector, Signal, SourceContext, SourceKind};
use crate::dom::{Document, HostEvent, NodeId, PointerEvent, PointerPhase};
use crate::lifecycle::{Lifecycle, LifecycleState, Refs, RouteState};
use crate::locator::Locator;
use crate::model::{Settings, SettingsCache, SettingsChange, WindowState};
use crate::reconciler::{
    ensure_chrome, reveal_range, sync_placeholder, update_status, ApplyResult, Reconciler,
};
use crate::scheduler::{ManualTicks, Reason, Scheduler, TickSource};
use crate::ui::{BarControl, DragState};
use tracing::{debug, info, trace, warn};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The document is not a chat page; nothing was touched.
    Skipped,
    /// No entries were found; status reads `0/0` and the placeholder is gone.
    Empty,
    /// Same `(total, hidden_top)` as the previous pass; only status refreshed.
    Unchanged {
        /// Entries discovered.
        total: usize,
        /// Oldest entries hidden.
        hidden_top: usize,
    },
    /// Visibility and placeholder were written.
    Applied {
        /// Entries discovered.
        total: usize,
        /// Oldest entries hidden.
        hidden_top: usize,
        /// Entries whose visibility flipped.
        toggled: usize,
    },
}

/// Windowing engine over one host document.
pub struct Engine<D: Document, T: TickSource = ManualTicks, S: SettingsStore = MemoryStore> {
    doc: D,
    locator: Locator,
    store: S,
    settings: SettingsCache,
    window: WindowState,
    scheduler: Scheduler<T>,
    detector: ChangeDetector<D>,
    lifecycle: Lifecycle,
    route: RouteState,
    reconciler: Reconciler,
    drag: DragState,
}

impl<D, T, S> std::fmt::Debug for Engine<D, T, S>
where
    D: Document,
    T: TickSource,
    S: SettingsStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.lifecycle.state())
            .field("route", &self.route.path())
            .field("window", &self.window)
            .field("settings", self.settings.get())
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

/// Source context built from disjoint engine fields.
fn context<'a>(
    locator: &'a Locator,
    lifecycle: &'a Lifecycle,
    window: &'a WindowState,
    settings: &'a SettingsCache,
) -> SourceContext<'a> {
    SourceContext {
        locator,
        lifecycle,
        window,
        settings: settings.get(),
    }
}

impl<D, T, S> Engine<D, T, S>
where
    D: Document,
    T: TickSource,
    S: SettingsStore,
{
    /// Engine with the standard change sources, not yet started.
    pub fn new(doc: D, locator: Locator, ticks: T, store: S) -> Self {
        let settings = SettingsCache::default();
        let window = WindowState::new(settings.get().threshold());
        Self {
            doc,
            locator,
            store,
            settings,
            window,
            scheduler: Scheduler::new(ticks),
            detector: ChangeDetector::standard(),
            lifecycle: Lifecycle::default(),
            route: RouteState::default(),
            reconciler: Reconciler::default(),
            drag: DragState::default(),
        }
    }

    /// Load settings, observe the initial route, attach sources and schedule
    /// the first pass. Does nothing once started.
    pub fn start(&mut self) {
        if self.lifecycle.state() != LifecycleState::Uninitialized {
            debug!("start ignored, engine already running");
            return;
        }

        let defaults = Settings::default().to_values();
        self.settings = match self.store.get(&defaults) {
            Ok(values) => SettingsCache::from_values(values),
            Err(err) => {
                warn!(error = %err, "settings store unavailable, using defaults");
                SettingsCache::default()
            }
        };
        self.window.reset(self.settings.get().threshold());

        let path = normalize_path(&self.doc.location());
        self.route.observe(&path);
        let state = self.lifecycle.discover(&self.doc, &self.locator);
        self.start_sources();
        info!(
            %path,
            state = state.as_str(),
            settings = ?self.settings.get(),
            "engine started"
        );
        self.scheduler.request(Reason::Start);
    }

    /// Handle one host event.
    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::Tick => {
                self.tick();
            }
            HostEvent::SettingsChanged(change) => self.apply_settings(&change),
            HostEvent::Click(target) => self.click(target),
            HostEvent::Pointer(pointer) => self.pointer(pointer),
            event => {
                let ctx = context(&self.locator, &self.lifecycle, &self.window, &self.settings);
                let signals = self.detector.dispatch(&self.doc, &ctx, &event);
                self.apply_signals(signals);
            }
        }
    }

    /// A tick arrived: run the pending pass, if any.
    pub fn tick(&mut self) -> Option<PassOutcome> {
        if !self.scheduler.begin_pass() {
            trace!("tick without pending pass");
            return None;
        }
        Some(self.run_pass())
    }

    /// One reconciliation pass over live state.
    pub fn run_pass(&mut self) -> PassOutcome {
        if !self.locator.is_chat_page(&self.doc) {
            trace!("not a chat page, pass skipped");
            return PassOutcome::Skipped;
        }

        let path = normalize_path(&self.doc.location());
        if self.route.observe(&path) {
            self.reset_route(&path);
        }

        let stale = self.lifecycle.is_detached(&self.doc)
            || (self.lifecycle.state() == LifecycleState::Discovering
                && self.locator.find_container(&self.doc).is_some());
        if stale {
            self.reattach();
        }

        let settings = *self.settings.get();
        let chrome = ensure_chrome(
            &mut self.doc,
            self.lifecycle.refs_mut(),
            &self.locator,
            &path,
            &settings,
        );
        if chrome.sentinel_replaced {
            self.restart_source(SourceKind::Sentinel);
        }

        let scope = self.scope();
        let entries = self.locator.collect_entries(&self.doc, Some(scope));
        self.window.observe(entries.len(), &settings);
        let result = self.reconciler.apply(
            &mut self.doc,
            self.lifecycle.refs_mut(),
            &entries,
            scope,
            &self.window,
            &settings,
        );

        let total = self.window.total();
        let hidden_top = self.window.hidden_top();
        let outcome = match result {
            _ if total == 0 => PassOutcome::Empty,
            ApplyResult::Suppressed => PassOutcome::Unchanged { total, hidden_top },
            ApplyResult::Written { toggled } => PassOutcome::Applied {
                total,
                hidden_top,
                toggled,
            },
        };
        debug!(
            ?outcome,
            visible_limit = self.window.visible_limit(),
            state = self.lifecycle.state().as_str(),
            "pass"
        );
        outcome
    }

    /// Reveal one batch of older entries.
    ///
    /// The newly visible entries and the placeholder are updated right away;
    /// a pass is requested to settle the rest.
    pub fn reveal_older(&mut self) {
        let scope = self.scope();
        let entries = self.locator.collect_entries(&self.doc, Some(scope));
        if entries.is_empty() {
            debug!("reveal ignored, no entries");
            return;
        }
        let settings = *self.settings.get();
        let range = self.window.reveal_older(entries.len(), &settings);
        debug!(
            ?range,
            hidden_top = self.window.hidden_top(),
            "revealing older entries"
        );
        reveal_range(&mut self.doc, &entries, range);
        sync_placeholder(
            &mut self.doc,
            self.lifecycle.refs_mut(),
            &entries,
            scope,
            self.window.hidden_top(),
            settings.batch(),
        );
        update_status(
            &mut self.doc,
            self.lifecycle.refs(),
            self.window.visible_count(),
            self.window.total(),
        );
        self.scheduler.request(Reason::UserAction);
    }

    /// Collapse back to the newest `maxVisible` entries, reconcile at once
    /// and scroll the container to its bottom edge.
    pub fn collapse_to_threshold(&mut self) {
        let scope = self.scope();
        let total = self.locator.collect_entries(&self.doc, Some(scope)).len();
        if total == 0 {
            debug!("collapse ignored, no entries");
            return;
        }
        let settings = *self.settings.get();
        self.window.collapse(total, &settings);
        debug!(hidden_top = self.window.hidden_top(), "collapsing");
        self.run_pass();

        let scroller = self.lifecycle.refs().container.unwrap_or_else(|| self.scope());
        if let Err(err) = self.doc.scroll_to_bottom(scroller) {
            debug!(error = %err, "scroll to bottom failed");
        }
    }

    /// Current window.
    pub fn window(&self) -> &WindowState {
        &self.window
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    /// Lifecycle state.
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Node references held across passes.
    pub fn refs(&self) -> &Refs {
        self.lifecycle.refs()
    }

    /// Status readout text, if the bar exists.
    pub fn status(&self) -> Option<&str> {
        self.lifecycle
            .refs()
            .bar
            .and_then(|bar| self.doc.text(bar.status))
    }

    /// Placeholder label, if the placeholder is in the document.
    pub fn placeholder_text(&self) -> Option<&str> {
        self.lifecycle
            .refs()
            .placeholder
            .filter(|&node| self.doc.is_connected(node))
            .and_then(|node| self.doc.text(node))
    }

    /// Last observed route.
    pub fn route_path(&self) -> Option<&str> {
        self.route.path()
    }

    /// Drag state of the bar.
    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    /// The owned document.
    pub fn document(&self) -> &D {
        &self.doc
    }

    /// The owned document, mutably (host-side changes).
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &Scheduler<T> {
        &self.scheduler
    }

    /// The scheduler, mutably (tick delivery).
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<T> {
        &mut self.scheduler
    }

    /// The settings store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The settings store, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Pattern tables.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    fn scope(&self) -> NodeId {
        self.lifecycle
            .refs()
            .container
            .unwrap_or_else(|| self.locator.fallback_scope(&self.doc))
    }

    fn start_sources(&mut self) {
        let ctx = context(&self.locator, &self.lifecycle, &self.window, &self.settings);
        self.detector.start_all(&mut self.doc, &ctx);
    }

    fn restart_source(&mut self, kind: SourceKind) {
        let ctx = context(&self.locator, &self.lifecycle, &self.window, &self.settings);
        self.detector.restart(kind, &mut self.doc, &ctx);
    }

    /// Stop all sources, rediscover, start all.
    ///
    /// The previous pass wrote to nodes that may be gone, so its snapshot
    /// no longer suppresses anything.
    fn reattach(&mut self) {
        self.reconciler.forget();
        self.detector.stop_all(&mut self.doc);
        let state = self.lifecycle.discover(&self.doc, &self.locator);
        self.start_sources();
        debug!(state = state.as_str(), "re-attached");
    }

    /// Replace the window wholesale and rediscover for a new route.
    fn reset_route(&mut self, path: &str) {
        info!(%path, "route changed, window reset");
        self.window.reset(self.settings.get().threshold());
        self.reconciler.forget();
        self.detector.stop_all(&mut self.doc);
        self.lifecycle.reset();
        self.lifecycle.discover(&self.doc, &self.locator);
        self.start_sources();
        self.scheduler.request(Reason::Navigation);
    }

    fn apply_signals(&mut self, signals: Vec<Signal>) {
        let mut reattached = false;
        for signal in signals {
            match signal {
                Signal::Reconcile(reason) => {
                    self.scheduler.request(reason);
                }
                Signal::Reattach => {
                    if !reattached {
                        reattached = true;
                        self.reattach();
                        self.scheduler.request(Reason::Reattached);
                    }
                }
                Signal::Navigated(path) => {
                    if self.route.observe(&path) {
                        self.reset_route(&path);
                    }
                }
                Signal::RevealOlder => self.reveal_older(),
                Signal::RestoreBar => self.restore_bar(),
            }
        }
    }

    fn apply_settings(&mut self, change: &SettingsChange) {
        if !self.settings.apply(change) {
            trace!(keys = ?change.keys, "settings change without recognised keys");
            return;
        }
        info!(settings = ?self.settings.get(), "settings changed");
        self.restart_source(SourceKind::Sentinel);
        self.scheduler.request(Reason::Settings);
    }

    fn restore_bar(&mut self) {
        let Some(bar) = self.lifecycle.refs().bar else {
            return;
        };
        if bar.is_connected(&self.doc) {
            return;
        }
        let mount = self.doc.body().unwrap_or_else(|| self.doc.root());
        self.doc.append_child(mount, bar.root);
        debug!("bar restored after eviction");
    }

    fn click(&mut self, target: NodeId) {
        let refs = *self.lifecycle.refs();
        let on_placeholder = refs
            .placeholder
            .is_some_and(|p| self.doc.parent(p).is_some() && self.doc.contains(p, target));
        if on_placeholder {
            self.reveal_older();
            return;
        }
        match refs.bar.and_then(|bar| bar.control_at(&self.doc, target)) {
            Some(BarControl::ShowOlder) => self.reveal_older(),
            Some(BarControl::Collapse) => self.collapse_to_threshold(),
            Some(BarControl::Handle) | None => {}
        }
    }

    fn pointer(&mut self, pointer: PointerEvent) {
        let Some(bar) = self.lifecycle.refs().bar else {
            return;
        };
        match pointer.phase {
            PointerPhase::Down => {
                if bar.control_at(&self.doc, pointer.target) == Some(BarControl::Handle) {
                    self.drag.begin(&mut self.doc, &bar, pointer.x, pointer.y);
                    trace!(x = pointer.x, y = pointer.y, "drag started");
                }
            }
            PointerPhase::Move => {
                self.drag.update(&mut self.doc, &bar, pointer.x, pointer.y);
            }
            PointerPhase::Up => {
                if self.drag.is_dragging() {
                    trace!("drag ended");
                }
                self.drag.end();
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
