//! Structural match patterns.
//!
//! A small selector language covering what the host markup needs:
//! tag, `#id`, `.class`, `[attr]`, `[attr="v"]`, `[attr^="v"]`, descendant
//! and child combinators, `:has(...)` with an optional leading `>`, and
//! comma-separated alternatives.
//!
//! Patterns are parsed once (fallibly) and then evaluated against any
//! [`Document`] through its read primitives, so a host adapter gets
//! matching for free.
//!
//! ```
//! use chatwin::dom::Pattern;
//!
//! let pattern: Pattern = r#"main div:has(> div[data-testid^="conversation-turn"])"#
//!     .parse()
//!     .expect("valid pattern");
//! assert_eq!(pattern.alternatives(), 1);
//! ```

use super::{Document, NodeId};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The pattern (or one alternative of it) was empty.
    #[error("empty pattern")]
    Empty,

    /// A character that cannot start or continue the current construct.
    #[error("unexpected '{ch}' at offset {pos}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset into the pattern source.
        pos: usize,
    },

    /// The pattern ended in the middle of a construct.
    #[error("unexpected end of pattern")]
    UnexpectedEnd,

    /// A pseudo-class other than `:has`.
    #[error("unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),
}

/// How two adjacent compounds relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
}

/// `:has(...)` argument: a chain anchored below the element being tested.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relative {
    /// `leading[i]` relates compound `i` to the previous one (or to the anchor).
    leading: Vec<Combinator>,
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    has: Vec<Vec<Relative>>,
}

/// A chain of compounds; the last one is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

/// A parsed structural pattern (one or more alternatives).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    alternatives: Vec<Complex>,
}

impl Pattern {
    /// Parse a pattern from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] on any syntax the language does not cover.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let mut parser = Parser::new(source);
        let alternatives = parser.selector_list()?;
        parser.skip_ws();
        if let Some((pos, ch)) = parser.peek_indexed() {
            return Err(PatternError::UnexpectedChar { ch, pos });
        }
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// The pattern source, trimmed.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of comma-separated alternatives.
    pub fn alternatives(&self) -> usize {
        self.alternatives.len()
    }

    /// Whether `node` matches any alternative.
    pub fn matches<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches_at(doc, node, complex.compounds.len() - 1))
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Complex {
    fn matches_at<D: Document + ?Sized>(&self, doc: &D, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(doc, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent(node)
                .is_some_and(|parent| self.matches_at(doc, parent, index - 1)),
            Combinator::Descendant => {
                let mut cursor = doc.parent(node);
                while let Some(ancestor) = cursor {
                    if self.matches_at(doc, ancestor, index - 1) {
                        return true;
                    }
                    cursor = doc.parent(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if let Some(want) = &self.tag {
            if !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if doc.attr(node, "id") != Some(want.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| doc.has_class(node, class)) {
            return false;
        }
        let attrs_ok = self.attrs.iter().all(|sel| match (&sel.op, doc.attr(node, &sel.name)) {
            (_, None) => false,
            (AttrOp::Exists, Some(_)) => true,
            (AttrOp::Equals(want), Some(value)) => value == want,
            (AttrOp::Prefix(want), Some(value)) => value.starts_with(want.as_str()),
        });
        if !attrs_ok {
            return false;
        }
        self.has
            .iter()
            .all(|list| list.iter().any(|relative| relative.matches_below(doc, node, 0)))
    }
}

impl Relative {
    fn matches_below<D: Document + ?Sized>(&self, doc: &D, anchor: NodeId, index: usize) -> bool {
        let candidates = match self.leading[index] {
            Combinator::Child => doc.children(anchor).to_vec(),
            Combinator::Descendant => descendants(doc, anchor),
        };
        candidates.into_iter().any(|candidate| {
            self.compounds[index].matches(doc, candidate)
                && (index + 1 == self.compounds.len()
                    || self.matches_below(doc, candidate, index + 1))
        })
    }
}

/// All descendants of `scope` in document order, excluding `scope`.
pub(crate) fn descendants<D: Document + ?Sized>(doc: &D, scope: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(scope).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(doc.children(node).iter().rev().copied());
    }
    out
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, ch)| ch)
    }

    fn peek_indexed(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn unexpected(&self) -> PatternError {
        match self.peek_indexed() {
            Some((pos, ch)) => PatternError::UnexpectedChar { ch, pos },
            None => PatternError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), PatternError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn selector_list(&mut self) -> Result<Vec<Complex>, PatternError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() || self.peek() == Some(',') {
                return Err(PatternError::Empty);
            }
            list.push(self.complex()?);
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
                continue;
            }
            return Ok(list);
        }
    }

    fn complex(&mut self) -> Result<Complex, PatternError> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        while let Some(combinator) = self.combinator() {
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    /// Consume a combinator if one follows; whitespace before `,` or `)` is not one.
    fn combinator(&mut self) -> Option<Combinator> {
        let save = self.pos;
        let had_ws = self.skip_ws();
        match self.peek() {
            Some('>') => {
                self.pos += 1;
                self.skip_ws();
                Some(Combinator::Child)
            }
            Some(',') | Some(')') | None => {
                self.pos = save;
                None
            }
            Some(_) if had_ws => Some(Combinator::Descendant),
            Some(_) => {
                self.pos = save;
                None
            }
        }
    }

    fn compound(&mut self) -> Result<Compound, PatternError> {
        let start = self.pos;
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(ch) if is_ident_char(ch) || ch == '\\' => {
                compound.tag = Some(self.ident()?);
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    let name = self.ident()?;
                    if !name.eq_ignore_ascii_case("has") {
                        return Err(PatternError::UnsupportedPseudo(name));
                    }
                    self.expect('(')?;
                    compound.has.push(self.relative_list()?);
                    self.skip_ws();
                    self.expect(')')?;
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn relative_list(&mut self) -> Result<Vec<Relative>, PatternError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            let first = if self.peek() == Some('>') {
                self.pos += 1;
                self.skip_ws();
                Combinator::Child
            } else {
                Combinator::Descendant
            };
            let mut leading = vec![first];
            let mut compounds = vec![self.compound()?];
            while let Some(combinator) = self.combinator() {
                leading.push(combinator);
                compounds.push(self.compound()?);
            }
            list.push(Relative { leading, compounds });
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
                continue;
            }
            return Ok(list);
        }
    }

    fn attribute(&mut self) -> Result<AttrSelector, PatternError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals(self.attr_value()?)
            }
            Some('^') => {
                self.pos += 1;
                self.expect('=')?;
                AttrOp::Prefix(self.attr_value()?)
            }
            _ => return Err(self.unexpected()),
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(AttrSelector { name, op })
    }

    fn attr_value(&mut self) -> Result<String, PatternError> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(ch) if ch == quote => return Ok(value),
                        Some('\\') => value.push(self.bump().ok_or(PatternError::UnexpectedEnd)?),
                        Some(ch) => value.push(ch),
                        None => return Err(PatternError::UnexpectedEnd),
                    }
                }
            }
            _ => self.ident(),
        }
    }

    fn ident(&mut self) -> Result<String, PatternError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    out.push(self.bump().ok_or(PatternError::UnexpectedEnd)?);
                }
                Some(ch) if is_ident_char(ch) => {
                    self.pos += 1;
                    out.push(ch);
                }
                _ => break,
            }
        }
        if out.is_empty() {
            return Err(self.unexpected());
        }
        Ok(out)
    }
}

impl fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("source", &self.source)
            .field("pos", &self.pos)
            .finish()
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}
