//! Headless host.
//!
//! [`ChatPage`] lays out a synthetic chat document the way the real host
//! renders it and performs the host's own mutations (new turns, streaming,
//! re-renders). [`Simulation`] owns an engine over that document and plays
//! the host event loop: it delivers queued observations and ticks until
//! nothing is left.
//!
//! ```text
//! body
//!   main
//!     div[data-testid=conversation]        container, scroll metrics
//!       div#thread                         thread region
//!         article[data-testid=conversation-turn-N]
//!           div[data-message-author-role]
//!     textarea                             composer
//! ```

pub mod script;

pub use script::{parse_script, run_script, ClickTarget, Snapshot, Step};

use crate::config::store::{MemoryStore, SettingsStore};
use crate::dom::{Document, HostEvent, MemoryDocument, NodeId};
use crate::engine::Engine;
use crate::locator::Locator;
use crate::model::ScriptError;
use crate::scheduler::ManualTicks;
use tracing::trace;

/// Rendered height of one turn.
pub const TURN_HEIGHT: f64 = 120.0;

/// Visible height of the conversation scroller.
pub const SCROLLER_HEIGHT: f64 = 600.0;

/// Default bound on host loop rounds per step.
pub const DEFAULT_MAX_ROUNDS: usize = 64;

/// Node handles of a synthetic chat page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPage {
    main: NodeId,
    container: NodeId,
    thread: NodeId,
    turns: Vec<NodeId>,
    next_turn: usize,
}

impl ChatPage {
    /// Fresh document at `location` holding a page with `turns` turns.
    pub fn build(location: &str, turns: usize) -> (MemoryDocument, Self) {
        let mut doc = MemoryDocument::new(location);
        let page = Self::mount(&mut doc, turns);
        (doc, page)
    }

    /// Lay out the page inside an existing document's body.
    pub fn mount(doc: &mut MemoryDocument, turns: usize) -> Self {
        let body = doc.body().unwrap_or_else(|| doc.root());
        let main = doc.element("main", &[]);
        doc.append_child(body, main);
        let (container, thread) = conversation(doc);
        doc.append_child(main, container);
        let composer = doc.element("textarea", &[("id", "prompt-textarea")]);
        doc.append_child(main, composer);

        let mut page = Self {
            main,
            container,
            thread,
            turns: Vec::new(),
            next_turn: 0,
        };
        page.append_turns(doc, turns);
        page
    }

    /// `main` element.
    pub fn main(&self) -> NodeId {
        self.main
    }

    /// Current conversation container.
    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Current thread region.
    pub fn thread(&self) -> NodeId {
        self.thread
    }

    /// Turn articles, oldest first.
    pub fn turns(&self) -> &[NodeId] {
        &self.turns
    }

    /// Append one turn; roles alternate user/assistant.
    pub fn append_turn(&mut self, doc: &mut MemoryDocument) -> NodeId {
        let index = self.next_turn;
        self.next_turn += 1;
        let testid = format!("conversation-turn-{index}");
        let article = doc.element("article", &[("data-testid", testid.as_str())]);
        let role = if index % 2 == 0 { "user" } else { "assistant" };
        let message = doc.element("div", &[("data-message-author-role", role)]);
        doc.set_text(message, &format!("message {index}"));
        doc.append_child(article, message);
        doc.append_child(self.thread, article);
        self.turns.push(article);
        self.update_metrics(doc);
        article
    }

    /// Append `count` turns.
    pub fn append_turns(&mut self, doc: &mut MemoryDocument, count: usize) {
        for _ in 0..count {
            self.append_turn(doc);
        }
    }

    /// Remove the oldest turn, if any.
    pub fn remove_oldest(&mut self, doc: &mut MemoryDocument) -> Option<NodeId> {
        if self.turns.is_empty() {
            return None;
        }
        let article = self.turns.remove(0);
        doc.remove(article);
        self.update_metrics(doc);
        Some(article)
    }

    /// Stream a chunk into the newest turn. Adds nested content, not entries.
    pub fn stream(&self, doc: &mut MemoryDocument, text: &str) -> Option<NodeId> {
        let article = *self.turns.last()?;
        let message = doc.children(article).first().copied().unwrap_or(article);
        let chunk = doc.element("span", &[]);
        doc.set_text(chunk, text);
        doc.append_child(message, chunk);
        Some(chunk)
    }

    /// Replace every turn with `turns` fresh ones (a conversation load).
    pub fn load(&mut self, doc: &mut MemoryDocument, turns: usize) {
        for article in self.turns.drain(..) {
            doc.remove(article);
        }
        self.next_turn = 0;
        self.append_turns(doc, turns);
    }

    /// Re-render: swap the container and thread for new nodes holding the
    /// same number of fresh turns.
    pub fn replace_container(&mut self, doc: &mut MemoryDocument) {
        let count = self.turns.len();
        let (container, thread) = conversation(doc);
        doc.insert_before(self.container, container);
        doc.remove(self.container);
        self.container = container;
        self.thread = thread;
        self.turns.clear();
        self.next_turn = 0;
        self.append_turns(doc, count);
        trace!(turns = count, "container replaced");
    }

    /// Re-render only the thread region: the container stays, the thread
    /// and its turns are new nodes.
    pub fn replace_thread(&mut self, doc: &mut MemoryDocument) {
        let count = self.turns.len();
        let thread = doc.element("div", &[("id", "thread")]);
        doc.insert_before(self.thread, thread);
        doc.remove(self.thread);
        self.thread = thread;
        self.turns.clear();
        self.next_turn = 0;
        self.append_turns(doc, count);
        trace!(turns = count, "thread replaced");
    }

    fn update_metrics(&self, doc: &mut MemoryDocument) {
        let content = self.turns.len() as f64 * TURN_HEIGHT;
        doc.set_scroll_metrics(self.container, content, SCROLLER_HEIGHT);
    }
}

fn conversation(doc: &mut MemoryDocument) -> (NodeId, NodeId) {
    let container = doc.element("div", &[("data-testid", "conversation")]);
    let thread = doc.element("div", &[("id", "thread")]);
    doc.append_child(container, thread);
    (container, thread)
}

/// Engine plus synthetic page, driven like the host event loop.
#[derive(Debug)]
pub struct Simulation<S: SettingsStore = MemoryStore> {
    engine: Engine<MemoryDocument, ManualTicks, S>,
    page: ChatPage,
    max_rounds: usize,
}

impl Simulation<MemoryStore> {
    /// Page at `location` with `turns` turns, default patterns, in-memory settings.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in pattern tables stop parsing.
    pub fn new(location: &str, turns: usize) -> Result<Self, ScriptError> {
        Ok(Self::with_parts(
            location,
            turns,
            Locator::chat_defaults()?,
            MemoryStore::new(),
        ))
    }
}

impl<S: SettingsStore> Simulation<S> {
    /// Page at `location` with explicit patterns and settings store.
    pub fn with_parts(location: &str, turns: usize, locator: Locator, store: S) -> Self {
        let (doc, page) = ChatPage::build(location, turns);
        Self {
            engine: Engine::new(doc, locator, ManualTicks::default(), store),
            page,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Change the bound on host loop rounds.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Start the engine and settle.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::NoQuiescence`] if the loop does not settle.
    pub fn start(&mut self) -> Result<usize, ScriptError> {
        self.engine.start();
        self.settle()
    }

    /// Deliver queued observations, then the pending tick, until neither is
    /// left. Returns the rounds taken.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::NoQuiescence`] when the bound is reached.
    pub fn settle(&mut self) -> Result<usize, ScriptError> {
        for round in 0..self.max_rounds {
            let events = self.engine.document_mut().drain_events();
            let tick = self.engine.scheduler_mut().ticks_mut().take();
            if events.is_empty() && !tick {
                return Ok(round);
            }
            for event in events {
                self.engine.handle(event);
            }
            if tick {
                self.engine.handle(HostEvent::Tick);
            }
        }
        Err(ScriptError::NoQuiescence {
            rounds: self.max_rounds,
        })
    }

    /// Run a host-side change against the page and document, without settling.
    pub fn host<R>(&mut self, change: impl FnOnce(&mut ChatPage, &mut MemoryDocument) -> R) -> R {
        change(&mut self.page, self.engine.document_mut())
    }

    /// Deliver one event immediately, without settling.
    pub fn deliver(&mut self, event: HostEvent) {
        self.engine.handle(event);
    }

    /// The engine.
    pub fn engine(&self) -> &Engine<MemoryDocument, ManualTicks, S> {
        &self.engine
    }

    /// The engine, mutably.
    pub fn engine_mut(&mut self) -> &mut Engine<MemoryDocument, ManualTicks, S> {
        &mut self.engine
    }

    /// The page layout.
    pub fn page(&self) -> &ChatPage {
        &self.page
    }

    /// The document.
    pub fn document(&self) -> &MemoryDocument {
        self.engine.document()
    }

    /// Turns currently hidden, oldest first.
    pub fn hidden_turns(&self) -> Vec<NodeId> {
        let doc = self.engine.document();
        self.page
            .turns()
            .iter()
            .copied()
            .filter(|&turn| doc.is_hidden(turn))
            .collect()
    }

    /// Report of the current state.
    pub fn snapshot(&self) -> Snapshot {
        let engine = &self.engine;
        let window = engine.window();
        Snapshot {
            total: window.total(),
            visible: window.visible_count(),
            hidden_top: window.hidden_top(),
            visible_limit: window.visible_limit(),
            placeholder: engine.placeholder_text().map(str::to_string),
            status: engine.status().map(str::to_string),
            state: engine.lifecycle_state().as_str().to_string(),
            path: engine.route_path().map(str::to_string),
        }
    }
}
