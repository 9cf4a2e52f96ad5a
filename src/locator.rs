//! Entry discovery.
//!
//! Pure functions of the current document state: locate the conversation
//! container and thread region, decide whether the page is a chat page, and
//! produce the ordered, de-duplicated entry sequence. Nothing here writes to
//! the document.
//!
//! The pattern lists exist because the host markup has changed across
//! versions; entry matches from every pattern are pooled, container patterns
//! are tried in order.

use crate::dom::{Document, NodeId, Pattern, PatternError};
use serde::Deserialize;
use std::collections::HashSet;

/// Textual pattern tables, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorPatterns {
    /// Conversation container candidates, most specific first.
    pub container: Vec<String>,
    /// Entry patterns; all matches are pooled.
    pub entry: Vec<String>,
    /// Thread (scroll) region candidates.
    pub thread: Vec<String>,
    /// Coarse entry-count signal inside the thread region.
    pub article: String,
    /// Presence of any of these marks a chat page.
    pub chat_markers: Vec<String>,
    /// Path fragments of conversation views that get the control bar.
    pub conversation_routes: Vec<String>,
}

impl Default for LocatorPatterns {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            container: owned(&[
                r#"main div[data-testid="conversation"]"#,
                r#"main div[data-tab="conversation"]"#,
                r#"main div:has(> div[data-testid^="conversation-turn"])"#,
                r#"main div.flex.flex-col:has([data-message-author-role])"#,
                r#"main[role="main"]"#,
                "main",
            ]),
            entry: owned(&[
                r#"[data-testid^="conversation-turn"]"#,
                "[data-message-author-role]",
                "article[data-message-author-role]",
                "div[data-message-id]",
                r#"div[data-testid="message"]"#,
            ]),
            thread: owned(&["#thread", r".thread-xl\:pt-header-height"]),
            article: "article".to_string(),
            chat_markers: owned(&[
                "textarea",
                r#"[data-testid="composer"]"#,
                r#"[data-testid="send-button"]"#,
            ]),
            conversation_routes: owned(&["/c/", "/share/"]),
        }
    }
}

/// Compiled pattern tables.
#[derive(Debug, Clone)]
pub struct Locator {
    container: Vec<Pattern>,
    entry: Vec<Pattern>,
    thread: Vec<Pattern>,
    article: Pattern,
    chat_markers: Vec<Pattern>,
    routes: Vec<String>,
    main: Pattern,
}

impl Locator {
    /// Compile pattern tables.
    ///
    /// # Errors
    ///
    /// Returns the first [`PatternError`] encountered.
    pub fn new(patterns: &LocatorPatterns) -> Result<Self, PatternError> {
        let compile = |list: &[String]| -> Result<Vec<Pattern>, PatternError> {
            list.iter().map(|s| Pattern::parse(s)).collect()
        };
        Ok(Self {
            container: compile(&patterns.container)?,
            entry: compile(&patterns.entry)?,
            thread: compile(&patterns.thread)?,
            article: Pattern::parse(&patterns.article)?,
            chat_markers: compile(&patterns.chat_markers)?,
            routes: patterns.conversation_routes.clone(),
            main: Pattern::parse("main")?,
        })
    }

    /// Locator for the default host markup.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in tables stop parsing.
    pub fn chat_defaults() -> Result<Self, PatternError> {
        Self::new(&LocatorPatterns::default())
    }

    /// First container pattern with a match anywhere in the document.
    pub fn find_container<D: Document + ?Sized>(&self, doc: &D) -> Option<NodeId> {
        let root = doc.root();
        self.container
            .iter()
            .find_map(|pattern| doc.query_first(root, pattern))
    }

    /// Broadest available scope when no container pattern matches.
    pub fn fallback_scope<D: Document + ?Sized>(&self, doc: &D) -> NodeId {
        doc.query_first(doc.root(), &self.main)
            .or_else(|| doc.body())
            .unwrap_or_else(|| doc.root())
    }

    /// Thread region: searched document-wide, then inside the container.
    pub fn find_thread<D: Document + ?Sized>(
        &self,
        doc: &D,
        container: Option<NodeId>,
    ) -> Option<NodeId> {
        let root = doc.root();
        self.thread.iter().find_map(|pattern| {
            doc.query_first(root, pattern)
                .or_else(|| container.and_then(|c| doc.query_first(c, pattern)))
        })
    }

    /// Coarse entry-count signal for a thread region.
    pub fn article_count<D: Document + ?Sized>(&self, doc: &D, thread: NodeId) -> usize {
        doc.query_all(thread, &self.article).len()
    }

    /// Whether the document looks like a chat page (composer present).
    pub fn is_chat_page<D: Document + ?Sized>(&self, doc: &D) -> bool {
        let root = doc.root();
        self.chat_markers
            .iter()
            .any(|pattern| doc.query_first(root, pattern).is_some())
    }

    /// Whether a normalised path is a conversation view.
    pub fn is_conversation_route(&self, path: &str) -> bool {
        let pathname = path.split('?').next().unwrap_or(path);
        self.routes.iter().any(|fragment| pathname.contains(fragment.as_str()))
    }

    /// Ordered, de-duplicated entries.
    ///
    /// 1. Pool matches of every entry pattern.
    /// 2. Keep those inside `container` (all of them when `None`).
    /// 3. Drop a match when any strict ancestor, up to but excluding the
    ///    container and the body, is itself a match: the outermost match of
    ///    a nested group represents the entry.
    /// 4. Sort by document order.
    pub fn collect_entries<D: Document + ?Sized>(
        &self,
        doc: &D,
        container: Option<NodeId>,
    ) -> Vec<NodeId> {
        let root = doc.root();
        let mut pooled = Vec::new();
        let mut seen = HashSet::new();
        for pattern in &self.entry {
            for node in doc.query_all(root, pattern) {
                if seen.insert(node) {
                    pooled.push(node);
                }
            }
        }

        let scoped: Vec<NodeId> = match container {
            Some(c) => pooled.into_iter().filter(|&n| doc.contains(c, n)).collect(),
            None => pooled,
        };
        let matched: HashSet<NodeId> = scoped.iter().copied().collect();
        let body = doc.body();

        let mut entries: Vec<NodeId> = scoped
            .into_iter()
            .filter(|&node| {
                let mut cursor = doc.parent(node);
                while let Some(ancestor) = cursor {
                    if Some(ancestor) == container || Some(ancestor) == body {
                        break;
                    }
                    if matched.contains(&ancestor) {
                        return false;
                    }
                    cursor = doc.parent(ancestor);
                }
                true
            })
            .collect();

        entries.sort_by(|&a, &b| doc.compare_order(a, b));
        entries
    }
}
