//! Document-wide watch for container replacement and bar eviction.

use super::{ChangeSource, Registration, Signal, SourceContext, SourceKind};
use crate::dom::{Document, HostEvent, MutationOptions, ObserveError};
use crate::lifecycle::LifecycleState;

/// Watches the whole document.
///
/// While discovering, any structural change is a chance to find the
/// container. While attached, it notices the container (or thread) being
/// removed or replaced by a re-render, and a thread region appearing late.
#[derive(Debug, Default)]
pub struct RootSource {
    registration: Registration,
}

impl<D: Document + ?Sized> ChangeSource<D> for RootSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Root
    }

    fn start(&mut self, doc: &mut D, _ctx: &SourceContext<'_>) -> Result<(), ObserveError> {
        let root = doc.root();
        let observer = doc.observe_mutations(root, &MutationOptions::subtree_child_list())?;
        self.registration.set(observer, root);
        Ok(())
    }

    fn stop(&mut self, doc: &mut D) {
        self.registration.clear(doc);
    }

    fn on_event(&mut self, doc: &D, ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
        if !self.registration.owns(event) {
            return Vec::new();
        }
        let lifecycle = ctx.lifecycle;
        let refs = lifecycle.refs();
        let mut signals = Vec::new();

        let rediscover = match lifecycle.state() {
            LifecycleState::Uninitialized => false,
            LifecycleState::Discovering => ctx.locator.find_container(doc).is_some(),
            LifecycleState::Attached => {
                lifecycle.is_detached(doc)
                    || ctx.locator.find_container(doc) != refs.container
                    || ctx.locator.find_thread(doc, refs.container) != refs.thread
            }
        };
        if rediscover {
            signals.push(Signal::Reattach);
        }

        if refs.bar.is_some_and(|bar| !bar.is_connected(doc)) {
            signals.push(Signal::RestoreBar);
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, NodeId};
    use crate::lifecycle::Lifecycle;
    use crate::locator::Locator;
    use crate::model::{Settings, WindowState};
    use crate::ui::Bar;

    struct Fixture {
        doc: MemoryDocument,
        locator: Locator,
        lifecycle: Lifecycle,
        window: WindowState,
        settings: Settings,
        source: RootSource,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                doc: MemoryDocument::new("/c/abc"),
                locator: Locator::chat_defaults().expect("default patterns"),
                lifecycle: Lifecycle::default(),
                window: WindowState::new(10),
                settings: Settings::default(),
                source: RootSource::default(),
            }
        }

        fn start(&mut self) {
            self.lifecycle.discover(&self.doc, &self.locator);
            let ctx = SourceContext {
                locator: &self.locator,
                lifecycle: &self.lifecycle,
                window: &self.window,
                settings: &self.settings,
            };
            ChangeSource::<MemoryDocument>::start(&mut self.source, &mut self.doc, &ctx)
                .expect("start");
        }

        fn signals(&mut self) -> Vec<Signal> {
            let ctx = SourceContext {
                locator: &self.locator,
                lifecycle: &self.lifecycle,
                window: &self.window,
                settings: &self.settings,
            };
            let mut out = Vec::new();
            for event in self.doc.drain_events() {
                out.extend(self.source.on_event(&self.doc, &ctx, &event));
            }
            out
        }

        fn add_main(&mut self) -> NodeId {
            let body = self.doc.body().expect("body");
            let main = self.doc.element("main", &[]);
            self.doc.append_child(body, main);
            main
        }
    }

    #[test]
    fn late_container_triggers_reattach() {
        let mut fx = Fixture::new();
        fx.start();
        assert_eq!(fx.lifecycle.state(), LifecycleState::Discovering);
        fx.add_main();
        assert_eq!(fx.signals(), vec![Signal::Reattach]);
    }

    #[test]
    fn unrelated_changes_are_quiet() {
        let mut fx = Fixture::new();
        fx.add_main();
        fx.start();
        let body = fx.doc.body().expect("body");
        let aside = fx.doc.element("aside", &[]);
        fx.doc.append_child(body, aside);
        assert!(fx.signals().is_empty());
    }

    #[test]
    fn replaced_container_triggers_reattach() {
        let mut fx = Fixture::new();
        let old = fx.add_main();
        fx.start();
        fx.doc.remove(old);
        fx.add_main();
        assert_eq!(fx.signals(), vec![Signal::Reattach]);
    }

    #[test]
    fn evicted_bar_is_reported() {
        let mut fx = Fixture::new();
        fx.add_main();
        fx.start();
        let bar = Bar::create(&mut fx.doc);
        let body = fx.doc.body().expect("body");
        fx.doc.append_child(body, bar.root);
        fx.lifecycle.refs_mut().bar = Some(bar);
        assert!(fx.signals().is_empty());

        fx.doc.remove(bar.root);
        assert_eq!(fx.signals(), vec![Signal::RestoreBar]);
    }
}
