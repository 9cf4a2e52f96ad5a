//! Structural changes inside the container.

use super::{ChangeSource, Registration, Signal, SourceContext, SourceKind};
use crate::dom::{Document, HostEvent, MutationOptions, ObserveError};
use crate::scheduler::Reason;

/// Attributes whose changes can alter entry identity or matching.
pub const IDENTITY_ATTRIBUTES: [&str; 3] = ["data-message-author-role", "data-testid", "class"];

/// Watches the container subtree for inserted/removed nodes and identity
/// attribute changes.
#[derive(Debug, Default)]
pub struct StructuralSource {
    registration: Registration,
}

impl<D: Document + ?Sized> ChangeSource<D> for StructuralSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Structural
    }

    fn start(&mut self, doc: &mut D, ctx: &SourceContext<'_>) -> Result<(), ObserveError> {
        let Some(container) = ctx.lifecycle.refs().container else {
            return Ok(());
        };
        let options = MutationOptions::subtree_child_list().with_attributes(&IDENTITY_ATTRIBUTES);
        let observer = doc.observe_mutations(container, &options)?;
        self.registration.set(observer, container);
        Ok(())
    }

    fn stop(&mut self, doc: &mut D) {
        self.registration.clear(doc);
    }

    fn on_event(&mut self, _doc: &D, _ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
        match event {
            HostEvent::Mutations { records, .. }
                if self.registration.owns(event) && !records.is_empty() =>
            {
                vec![Signal::Reconcile(Reason::Structure)]
            }
            _ => Vec::new(),
        }
    }
}
