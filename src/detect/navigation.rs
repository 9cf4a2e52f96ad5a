//! Route changes reported by the host's navigation subscription.

use super::{ChangeSource, Signal, SourceContext, SourceKind};
use crate::dom::{Document, HostEvent, ObserveError};
use tracing::debug;

/// Normalised route of a location: `pathname + search`.
///
/// Scheme, host and `#fragment` are dropped; an empty path becomes `/`.
pub fn normalize_path(location: &str) -> String {
    let without_fragment = location.split('#').next().unwrap_or_default();
    let after_origin = match without_fragment.find("://") {
        Some(scheme_end) => {
            let rest = &without_fragment[scheme_end + 3..];
            match rest.find(['/', '?']) {
                Some(path_start) => &rest[path_start..],
                None => "",
            }
        }
        None => without_fragment,
    };
    if after_origin.is_empty() {
        "/".to_string()
    } else if after_origin.starts_with('?') {
        format!("/{after_origin}")
    } else {
        after_origin.to_string()
    }
}

/// Turns navigation events into [`Signal::Navigated`].
///
/// The host subscription outlives stop/start cycles; only the forwarding is
/// switched off while stopped.
#[derive(Debug, Default)]
pub struct NavigationSource {
    subscribed: bool,
    active: bool,
}

impl<D: Document + ?Sized> ChangeSource<D> for NavigationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Navigation
    }

    fn start(&mut self, doc: &mut D, _ctx: &SourceContext<'_>) -> Result<(), ObserveError> {
        if !self.subscribed {
            doc.subscribe_navigation()?;
            self.subscribed = true;
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self, _doc: &mut D) {
        self.active = false;
    }

    fn on_event(&mut self, _doc: &D, _ctx: &SourceContext<'_>, event: &HostEvent) -> Vec<Signal> {
        match event {
            HostEvent::Navigation(navigation) if self.active => {
                let path = normalize_path(&navigation.location);
                debug!(kind = ?navigation.kind, %path, "navigation");
                vec![Signal::Navigated(path)]
            }
            _ => Vec::new(),
        }
    }
}
