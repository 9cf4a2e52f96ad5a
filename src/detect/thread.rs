//! Thread region: cheap growth signal plus detachment.

use super::{ChangeSource, Registration, Signal, SourceContext, SourceKind};
use crate::dom::{Document, HostEvent, MutationOptions, ObserveError};
use crate::scheduler::Reason;

/// Watches the thread region's coarse entry count.
#[derive(Debug, Default)]
pub struct ThreadSource {
    registration: Registration,
    last_count: usize,
}

impl<D: Document + ?Sized> ChangeSource<D> for ThreadSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Thread
    }

    fn start(&mut self, doc: &mut D, ctx: &SourceContext<'_>) -> Result<(), ObserveError> {
        let Some(thread) = ctx.lifecycle.refs().thread else {
            return Ok(());
        };
        self.last_count = ctx.locator.article_count(doc, thread);
        let observer = doc.observe_mutations(thread, &MutationOptions::subtree_child_list())?;
        self.registration.set(observer, thread);
        Ok(())
    }

    fn stop(&mut self, doc: &mut D) {
        self.registration.clear(doc);
    }

    fn on_event(&mut self, doc: &D, ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
        if !self.registration.owns(event) {
            return Vec::new();
        }
        let Some(thread) = self.registration.target() else {
            return Vec::new();
        };
        if !doc.is_connected(thread) {
            return vec![Signal::Reattach];
        }
        let count = ctx.locator.article_count(doc, thread);
        if count == self.last_count {
            return Vec::new();
        }
        self.last_count = count;
        vec![Signal::Reconcile(Reason::ThreadGrowth)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, NodeId};
    use crate::lifecycle::Lifecycle;
    use crate::locator::Locator;
    use crate::model::{Settings, WindowState};

    fn page() -> (MemoryDocument, NodeId, NodeId) {
        let mut doc = MemoryDocument::new("/c/abc");
        let body = doc.body().expect("body");
        let main = doc.element("main", &[]);
        doc.append_child(body, main);
        let thread = doc.element("div", &[("id", "thread")]);
        doc.append_child(main, thread);
        (doc, main, thread)
    }

    #[test]
    fn only_article_count_changes_signal() {
        let (mut doc, _, thread) = page();
        let locator = Locator::chat_defaults().expect("default patterns");
        let mut lifecycle = Lifecycle::default();
        lifecycle.discover(&doc, &locator);
        let window = WindowState::new(10);
        let settings = Settings::default();
        let ctx = SourceContext {
            locator: &locator,
            lifecycle: &lifecycle,
            window: &window,
            settings: &settings,
        };
        let mut source = ThreadSource::default();
        ChangeSource::<MemoryDocument>::start(&mut source, &mut doc, &ctx).expect("start");

        let article = doc.element("article", &[]);
        doc.append_child(thread, article);
        let events = doc.drain_events();
        assert_eq!(
            source.on_event(&doc, &ctx, &events[0]),
            vec![Signal::Reconcile(Reason::ThreadGrowth)]
        );

        let span = doc.element("span", &[]);
        doc.append_child(article, span);
        let events = doc.drain_events();
        assert!(source.on_event(&doc, &ctx, &events[0]).is_empty());
    }

    #[test]
    fn detached_thread_requests_reattach() {
        let (mut doc, _, thread) = page();
        let locator = Locator::chat_defaults().expect("default patterns");
        let mut lifecycle = Lifecycle::default();
        lifecycle.discover(&doc, &locator);
        let window = WindowState::new(10);
        let settings = Settings::default();
        let ctx = SourceContext {
            locator: &locator,
            lifecycle: &lifecycle,
            window: &window,
            settings: &settings,
        };
        let mut source = ThreadSource::default();
        ChangeSource::<MemoryDocument>::start(&mut source, &mut doc, &ctx).expect("start");

        let child = doc.element("p", &[]);
        doc.append_child(thread, child);
        doc.remove(thread);
        let events = doc.drain_events();
        assert_eq!(source.on_event(&doc, &ctx, &events[0]), vec![Signal::Reattach]);
    }
}
