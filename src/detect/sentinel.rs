//! Scroll-to-top autoload.

use super::{ChangeSource, Registration, Signal, SourceContext, SourceKind};
use crate::dom::{Document, HostEvent, ObserveError};

/// Watches the sentinel at the top of the thread region.
///
/// An intersection requests a batch reveal only when there is something to
/// reveal and the region actually scrolls.
#[derive(Debug, Default)]
pub struct SentinelSource {
    registration: Registration,
}

impl<D: Document + ?Sized> ChangeSource<D> for SentinelSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Sentinel
    }

    fn start(&mut self, doc: &mut D, ctx: &SourceContext<'_>) -> Result<(), ObserveError> {
        if !ctx.settings.autoload_on_scroll {
            return Ok(());
        }
        let Some(sentinel) = ctx.lifecycle.refs().sentinel else {
            return Ok(());
        };
        let observer = doc.observe_intersection(sentinel)?;
        self.registration.set(observer, sentinel);
        Ok(())
    }

    fn stop(&mut self, doc: &mut D) {
        self.registration.clear(doc);
    }

    fn on_event(&mut self, doc: &D, ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
        let HostEvent::Intersection { intersecting, .. } = event else {
            return Vec::new();
        };
        if !self.registration.owns(event) || !*intersecting {
            return Vec::new();
        }
        let window = ctx.window;
        if !ctx.settings.autoload_on_scroll || window.total() == 0 || window.is_fully_revealed() {
            return Vec::new();
        }
        let Some(thread) = ctx.lifecycle.refs().thread else {
            return Vec::new();
        };
        let scroller = doc.parent(thread).unwrap_or(thread);
        if !doc.is_scrollable(scroller) {
            return Vec::new();
        }
        vec![Signal::RevealOlder]
    }
}
