//! Arena-backed in-memory document.
//!
//! Implements [`Document`] with enough fidelity to drive the engine without
//! a browser: element tree, attributes, text, visibility, scroll metrics,
//! geometry, mutation/intersection observers and navigation. Observations
//! are queued and handed to the host loop through [`MemoryDocument::drain_events`].
//!
//! Every write made through the trait, by the engine or by test code acting
//! as the host page, is counted in [`WriteStats`].

use super::{
    Document, DocumentError, HostEvent, MutationKind, MutationOptions, MutationRecord,
    NavigationEvent, NavigationKind, NodeId, ObserveError, ObserverId, Rect, Viewport,
};
use std::collections::{HashMap, VecDeque};

/// Counters of writes issued against the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteStats {
    /// `set_hidden` calls.
    pub visibility: usize,
    /// Insertions, moves and removals.
    pub structure: usize,
    /// `set_text` calls.
    pub text: usize,
    /// `set_attr` and `set_position` calls.
    pub attribute: usize,
}

impl WriteStats {
    /// Field-wise difference `self - earlier`.
    pub fn since(&self, earlier: &WriteStats) -> WriteStats {
        WriteStats {
            visibility: self.visibility - earlier.visibility,
            structure: self.structure - earlier.structure,
            text: self.text - earlier.text,
            attribute: self.attribute - earlier.attribute,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct NodeData {
    tag: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
}

#[derive(Debug, Clone)]
enum Observation {
    Mutations(MutationOptions),
    Intersection,
}

#[derive(Debug, Clone)]
struct Observer {
    id: ObserverId,
    target: NodeId,
    observation: Observation,
    active: bool,
}

#[derive(Debug, Clone, Copy)]
struct ScrollMetrics {
    scroll_height: f64,
    client_height: f64,
    scroll_top: f64,
}

/// In-memory [`Document`] host.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    location: String,
    viewport: Viewport,
    rects: HashMap<NodeId, Rect>,
    scroll: HashMap<NodeId, ScrollMetrics>,
    observers: Vec<Observer>,
    pending: Vec<(ObserverId, Vec<MutationRecord>)>,
    queued: VecDeque<HostEvent>,
    navigation_subscribed: bool,
    refuse_observers: bool,
    refuse_scroll: bool,
    stats: WriteStats,
}

impl MemoryDocument {
    /// Empty `html > body` document at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        let mut nodes = vec![
            NodeData {
                tag: "html".to_string(),
                ..NodeData::default()
            },
            NodeData {
                tag: "body".to_string(),
                parent: Some(NodeId(0)),
                ..NodeData::default()
            },
        ];
        nodes[0].children.push(NodeId(1));
        Self {
            nodes,
            root: NodeId(0),
            body: NodeId(1),
            location: location.into(),
            viewport: Viewport {
                width: 1280.0,
                height: 800.0,
            },
            rects: HashMap::new(),
            scroll: HashMap::new(),
            observers: Vec::new(),
            pending: Vec::new(),
            queued: VecDeque::new(),
            navigation_subscribed: false,
            refuse_observers: false,
            refuse_scroll: false,
            stats: WriteStats::default(),
        }
    }

    /// Create a detached element with attributes.
    pub fn element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag);
        if let Some(data) = self.data_mut(node) {
            data.attrs = attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
        node
    }

    /// Writes issued so far.
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Make every later observer registration fail.
    pub fn set_refuse_observers(&mut self, refuse: bool) {
        self.refuse_observers = refuse;
    }

    /// Make every later `scroll_to_bottom` fail.
    pub fn set_refuse_scroll(&mut self, refuse: bool) {
        self.refuse_scroll = refuse;
    }

    /// Set the content and visible heights of a node.
    pub fn set_scroll_metrics(&mut self, node: NodeId, scroll_height: f64, client_height: f64) {
        let metrics = self.scroll.entry(node).or_insert(ScrollMetrics {
            scroll_height: 0.0,
            client_height: 0.0,
            scroll_top: 0.0,
        });
        metrics.scroll_height = scroll_height;
        metrics.client_height = client_height;
    }

    /// Current scroll offset of a node.
    pub fn scroll_top(&self, node: NodeId) -> f64 {
        self.scroll.get(&node).map_or(0.0, |m| m.scroll_top)
    }

    /// Set a node's bounding rectangle.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    /// Resize the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Act as the host router: change location and notify subscribers.
    pub fn navigate(&mut self, kind: NavigationKind, location: impl Into<String>) {
        self.location = location.into();
        if self.navigation_subscribed {
            self.queued.push_back(HostEvent::Navigation(NavigationEvent {
                kind,
                location: self.location.clone(),
            }));
        }
    }

    /// Act as the browser: report that `node` entered or left the viewport.
    pub fn set_intersecting(&mut self, node: NodeId, intersecting: bool) {
        let events: Vec<HostEvent> = self
            .observers
            .iter()
            .filter(|o| o.active && o.target == node)
            .filter(|o| matches!(o.observation, Observation::Intersection))
            .map(|o| HostEvent::Intersection {
                observer: o.id,
                intersecting,
            })
            .collect();
        self.queued.extend(events);
    }

    /// Number of active observers.
    pub fn active_observers(&self) -> usize {
        self.observers.iter().filter(|o| o.active).count()
    }

    /// Take every pending observation: mutation batches first (per observer,
    /// in registration order), then intersection and navigation events.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        let mut events: Vec<HostEvent> = self
            .pending
            .drain(..)
            .map(|(observer, records)| HostEvent::Mutations { observer, records })
            .collect();
        events.extend(self.queued.drain(..));
        events
    }

    /// Indented outline of the subtree under `node`, for assertions.
    ///
    /// One line per element: tag, `#id`, `.classes`, other attributes,
    /// `(hidden)`, and quoted text.
    pub fn outline(&self, node: NodeId) -> String {
        let mut lines = Vec::new();
        self.outline_into(node, 0, &mut lines);
        lines.join("\n")
    }

    fn outline_into(&self, node: NodeId, depth: usize, lines: &mut Vec<String>) {
        let Some(data) = self.data(node) else {
            return;
        };
        let mut line = format!("{}{}", "  ".repeat(depth), data.tag);
        for (name, value) in &data.attrs {
            match name.as_str() {
                "id" => line.push_str(&format!("#{value}")),
                "class" => {
                    for class in value.split_whitespace() {
                        line.push_str(&format!(".{class}"));
                    }
                }
                _ => line.push_str(&format!("[{name}={value}]")),
            }
        }
        if data.hidden {
            line.push_str(" (hidden)");
        }
        if let Some(text) = &data.text {
            line.push_str(&format!(" {text:?}"));
        }
        lines.push(line);
        for &child in &data.children {
            self.outline_into(child, depth + 1, lines);
        }
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0 as usize)
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.0 as usize)
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.data(node).and_then(|d| d.parent) else {
            return false;
        };
        self.record(parent, MutationKind::ChildList);
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|&c| c != node);
        }
        if let Some(data) = self.data_mut(node) {
            data.parent = None;
        }
        true
    }

    fn attach_at(&mut self, parent: NodeId, node: NodeId, index: Option<usize>) {
        if parent == node || self.contains(node, parent) || self.data(parent).is_none() {
            return;
        }
        self.stats.structure += 1;
        self.detach(node);
        if let Some(data) = self.data_mut(parent) {
            let at = index.unwrap_or(data.children.len()).min(data.children.len());
            data.children.insert(at, node);
        }
        if let Some(data) = self.data_mut(node) {
            data.parent = Some(parent);
        }
        self.record(parent, MutationKind::ChildList);
    }

    /// Queue a record for every observer interested in a change on `target`.
    fn record(&mut self, target: NodeId, kind: MutationKind) {
        let interested: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|o| o.active)
            .filter(|o| match &o.observation {
                Observation::Mutations(options) => {
                    let wants_kind = match &kind {
                        MutationKind::ChildList => options.child_list,
                        MutationKind::Attribute(name) => {
                            options.attribute_filter.iter().any(|f| f == name)
                        }
                    };
                    wants_kind
                        && (o.target == target || (options.subtree && self.contains(o.target, target)))
                }
                Observation::Intersection => false,
            })
            .map(|o| o.id)
            .collect();
        for observer in interested {
            let record = MutationRecord {
                kind: kind.clone(),
                target,
            };
            match self.pending.iter_mut().find(|(id, _)| *id == observer) {
                Some((_, records)) => records.push(record),
                None => self.pending.push((observer, vec![record])),
            }
        }
    }

    fn register(&mut self, target: NodeId, observation: Observation) -> Result<ObserverId, ObserveError> {
        if self.refuse_observers {
            return Err(ObserveError::Unsupported(match observation {
                Observation::Mutations(_) => "mutation",
                Observation::Intersection => "intersection",
            }));
        }
        if !self.is_connected(target) {
            return Err(ObserveError::Detached(target));
        }
        let id = ObserverId(self.observers.len() as u32);
        self.observers.push(Observer {
            id,
            target,
            observation,
            active: true,
        });
        Ok(id)
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        self.data(node).map(|d| d.tag.as_str())
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.data(node)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node)?.parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map_or(&[], |d| d.children.as_slice())
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        self.data(node)?.text.as_deref()
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        self.data(node).is_some_and(|d| d.hidden)
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.rects.get(&node).copied().unwrap_or_default()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn is_scrollable(&self, node: NodeId) -> bool {
        self.scroll
            .get(&node)
            .is_some_and(|m| m.scroll_height > m.client_height)
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            ..NodeData::default()
        });
        id
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(data) = self.data_mut(node) else {
            return;
        };
        match data.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => data.attrs.push((name.to_string(), value.to_string())),
        }
        self.stats.attribute += 1;
        self.record(node, MutationKind::Attribute(name.to_string()));
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach_at(parent, child, None);
    }

    fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach_at(parent, child, Some(0));
    }

    fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        let Some(parent) = self.parent(reference) else {
            return;
        };
        // Detach first so the reference index accounts for a same-parent move.
        self.detach(node);
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == reference);
        self.attach_at(parent, node, index);
    }

    fn remove(&mut self, node: NodeId) {
        if self.detach(node) {
            self.stats.structure += 1;
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        let Some(data) = self.data_mut(node) else {
            return;
        };
        data.text = Some(text.to_string());
        self.stats.text += 1;
        self.record(node, MutationKind::ChildList);
    }

    fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        let Some(data) = self.data_mut(node) else {
            return;
        };
        data.hidden = hidden;
        self.stats.visibility += 1;
        self.record(node, MutationKind::Attribute("style".to_string()));
    }

    fn set_position(&mut self, node: NodeId, left: f64, top: f64) {
        let rect = self.rects.entry(node).or_default();
        rect.left = left;
        rect.top = top;
        self.stats.attribute += 1;
        self.record(node, MutationKind::Attribute("style".to_string()));
    }

    fn scroll_to_bottom(&mut self, node: NodeId) -> Result<(), DocumentError> {
        if self.refuse_scroll {
            return Err(DocumentError::Unsupported("scrolling"));
        }
        if !self.is_connected(node) {
            return Err(DocumentError::Detached(node));
        }
        if let Some(metrics) = self.scroll.get_mut(&node) {
            metrics.scroll_top = (metrics.scroll_height - metrics.client_height).max(0.0);
        }
        Ok(())
    }

    fn observe_mutations(
        &mut self,
        target: NodeId,
        options: &MutationOptions,
    ) -> Result<ObserverId, ObserveError> {
        self.register(target, Observation::Mutations(options.clone()))
    }

    fn observe_intersection(&mut self, target: NodeId) -> Result<ObserverId, ObserveError> {
        self.register(target, Observation::Intersection)
    }

    fn subscribe_navigation(&mut self) -> Result<(), ObserveError> {
        if self.refuse_observers {
            return Err(ObserveError::Unsupported("navigation"));
        }
        self.navigation_subscribed = true;
        Ok(())
    }

    fn disconnect(&mut self, observer: ObserverId) {
        if let Some(entry) = self.observers.iter_mut().find(|o| o.id == observer) {
            entry.active = false;
        }
        self.pending.retain(|(id, _)| *id != observer);
    }
}
