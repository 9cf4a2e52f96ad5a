//! Change detection.
//!
//! Each source watches one aspect of the document and turns host events into
//! [`Signal`]s. Sources never compute the window; they only ask the engine to
//! reconcile, re-attach, reset the route, reveal a batch or restore the bar.
//!
//! Sources share one shape ([`ChangeSource`]) so that re-attachment is always
//! "stop all, rediscover, start all". A source whose registration the host
//! refuses stays inert; the others keep working and the next discovery cycle
//! retries it.
//!
//! # Sources
//!
//! - `structural`: child-list and identity attributes on the container subtree
//! - `thread`: coarse entry count of the thread region, and its detachment
//! - `root`: container replacement, late discovery, bar eviction
//! - `navigation`: route changes
//! - `sentinel`: scroll-to-top intersection

pub mod navigation;
pub mod root;
pub mod sentinel;
pub mod structural;
pub mod thread;

pub use navigation::{normalize_path, NavigationSource};
pub use root::RootSource;
pub use sentinel::SentinelSource;
pub use structural::StructuralSource;
pub use thread::ThreadSource;

use crate::dom::{Document, HostEvent, NodeId, ObserveError, ObserverId};
use crate::lifecycle::Lifecycle;
use crate::locator::Locator;
use crate::model::{Settings, WindowState};
use crate::scheduler::Reason;
use tracing::{debug, trace};

/// Which source produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Container subtree.
    Structural,
    /// Thread region.
    Thread,
    /// Document root.
    Root,
    /// Route changes.
    Navigation,
    /// Scroll sentinel.
    Sentinel,
}

impl SourceKind {
    /// Name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Structural => "structural",
            SourceKind::Thread => "thread",
            SourceKind::Root => "root",
            SourceKind::Navigation => "navigation",
            SourceKind::Sentinel => "sentinel",
        }
    }
}

/// Request from a change source to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Schedule a reconciliation pass.
    Reconcile(Reason),
    /// Stop all sources, rediscover, start all, then reconcile.
    Reattach,
    /// The route may have changed to this normalised path.
    Navigated(String),
    /// Reveal one batch of older entries.
    RevealOlder,
    /// The control bar was evicted from the document.
    RestoreBar,
}

/// Read-only engine state handed to sources.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    /// Pattern tables.
    pub locator: &'a Locator,
    /// Lifecycle state and references.
    pub lifecycle: &'a Lifecycle,
    /// Current window.
    pub window: &'a WindowState,
    /// Current settings.
    pub settings: &'a Settings,
}

/// A uniform change source.
pub trait ChangeSource<D: Document + ?Sized> {
    /// Which source this is.
    fn kind(&self) -> SourceKind;

    /// Register with the host for the current attachment.
    ///
    /// A source with nothing to observe returns `Ok(())` and stays inert.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] when the host refuses the registration.
    fn start(&mut self, doc: &mut D, ctx: &SourceContext<'_>) -> Result<(), ObserveError>;

    /// Drop every registration. Safe to call when not started.
    fn stop(&mut self, doc: &mut D);

    /// Translate a host event into signals. Events for other sources yield nothing.
    fn on_event(&mut self, doc: &D, ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal>;
}

/// One host observer registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Registration {
    observer: Option<ObserverId>,
    target: Option<NodeId>,
}

impl Registration {
    pub(crate) fn set(&mut self, observer: ObserverId, target: NodeId) {
        self.observer = Some(observer);
        self.target = Some(target);
    }

    pub(crate) fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub(crate) fn clear<D: Document + ?Sized>(&mut self, doc: &mut D) {
        if let Some(observer) = self.observer.take() {
            doc.disconnect(observer);
        }
        self.target = None;
    }

    /// Whether an observer event belongs to this registration.
    pub(crate) fn owns(&self, event: &HostEvent) -> bool {
        let observer = match event {
            HostEvent::Mutations { observer, .. } => observer,
            HostEvent::Intersection { observer, .. } => observer,
            _ => return false,
        };
        self.observer == Some(*observer)
    }
}

/// The set of running change sources.
pub struct ChangeDetector<D: Document + ?Sized> {
    sources: Vec<Box<dyn ChangeSource<D>>>,
}

impl<D: Document + ?Sized> std::fmt::Debug for ChangeDetector<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("sources", &self.kinds())
            .finish()
    }
}

impl<D: Document + ?Sized> Default for ChangeDetector<D> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<D: Document + ?Sized> ChangeDetector<D> {
    /// All five sources.
    pub fn standard() -> Self {
        Self::with_sources(vec![
            Box::new(NavigationSource::default()),
            Box::new(RootSource::default()),
            Box::new(StructuralSource::default()),
            Box::new(ThreadSource::default()),
            Box::new(SentinelSource::default()),
        ])
    }

    /// A custom source set.
    pub fn with_sources(sources: Vec<Box<dyn ChangeSource<D>>>) -> Self {
        Self { sources }
    }

    /// Kinds of the installed sources, in dispatch order.
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Start every source. Registration failures are logged and swallowed.
    pub fn start_all(&mut self, doc: &mut D, ctx: &SourceContext<'_>) {
        for source in &mut self.sources {
            start_logged(source.as_mut(), doc, ctx);
        }
    }

    /// Stop every source.
    pub fn stop_all(&mut self, doc: &mut D) {
        for source in &mut self.sources {
            source.stop(doc);
        }
    }

    /// Stop and start one kind of source.
    pub fn restart(&mut self, kind: SourceKind, doc: &mut D, ctx: &SourceContext<'_>) {
        for source in self.sources.iter_mut().filter(|s| s.kind() == kind) {
            source.stop(doc);
            start_logged(source.as_mut(), doc, ctx);
        }
    }

    /// Offer an event to every source and collect their signals.
    pub fn dispatch(&mut self, doc: &D, ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
        let mut signals = Vec::new();
        for source in &mut self.sources {
            let emitted = source.on_event(doc, ctx, event);
            if !emitted.is_empty() {
                trace!(source = source.kind().as_str(), ?emitted, "signals");
            }
            signals.extend(emitted);
        }
        signals
    }
}

fn start_logged<D: Document + ?Sized>(
    source: &mut dyn ChangeSource<D>,
    doc: &mut D,
    ctx: &SourceContext<'_>,
) {
    if let Err(err) = source.start(doc, ctx) {
        debug!(source = source.kind().as_str(), error = %err, "change source unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, MutationRecord, MutationKind};

    #[derive(Default)]
    struct Counting {
        starts: usize,
        stops: usize,
        refuse: bool,
    }

    impl<D: Document + ?Sized> ChangeSource<D> for Counting {
        fn kind(&self) -> SourceKind {
            SourceKind::Structural
        }

        fn start(&mut self, _doc: &mut D, _ctx: &SourceContext<'_>) -> Result<(), ObserveError> {
            self.starts += 1;
            if self.refuse {
                Err(ObserveError::Unsupported("mutation"))
            } else {
                Ok(())
            }
        }

        fn stop(&mut self, _doc: &mut D) {
            self.stops += 1;
        }

        fn on_event(&mut self, _doc: &D, _ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
            match event {
                HostEvent::Tick => vec![Signal::Reconcile(Reason::Structure)],
                _ => Vec::new(),
            }
        }
    }

    fn fixtures() -> (Locator, Lifecycle, WindowState, Settings) {
        (
            Locator::chat_defaults().expect("default patterns"),
            Lifecycle::default(),
            WindowState::new(10),
            Settings::default(),
        )
    }

    #[test]
    fn refused_start_is_swallowed() {
        let (locator, lifecycle, window, settings) = fixtures();
        let ctx = SourceContext {
            locator: &locator,
            lifecycle: &lifecycle,
            window: &window,
            settings: &settings,
        };
        let mut doc = MemoryDocument::new("/");
        let mut detector: ChangeDetector<MemoryDocument> = ChangeDetector::with_sources(vec![
            Box::new(Counting {
                refuse: true,
                ..Counting::default()
            }),
            Box::new(Counting::default()),
        ]);
        detector.start_all(&mut doc, &ctx);
        detector.restart(SourceKind::Structural, &mut doc, &ctx);
        let signals = detector.dispatch(&doc, &ctx, &HostEvent::Tick);
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn standard_set_has_every_kind() {
        let detector: ChangeDetector<MemoryDocument> = ChangeDetector::standard();
        assert_eq!(
            detector.kinds(),
            vec![
                SourceKind::Navigation,
                SourceKind::Root,
                SourceKind::Structural,
                SourceKind::Thread,
                SourceKind::Sentinel,
            ]
        );
    }

    #[test]
    fn registration_owns_only_its_observer() {
        let mut doc = MemoryDocument::new("/");
        let body = doc.body().expect("body");
        let id = doc
            .observe_mutations(body, &crate::dom::MutationOptions::subtree_child_list())
            .expect("observe");
        let mut registration = Registration::default();
        registration.set(id, body);

        let mine = HostEvent::Mutations {
            observer: id,
            records: vec![MutationRecord {
                kind: MutationKind::ChildList,
                target: body,
            }],
        };
        let other = HostEvent::Intersection {
            observer: ObserverId::from_raw(id.raw() + 1),
            intersecting: true,
        };
        assert!(registration.owns(&mine));
        assert!(!registration.owns(&other));
        assert!(!registration.owns(&HostEvent::Tick));

        registration.clear(&mut doc);
        assert_eq!(registration.target(), None);
        assert_eq!(doc.active_observers(), 0);
    }
}
