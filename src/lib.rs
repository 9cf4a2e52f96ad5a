//! Chat Window (chatwin)
//!
//! Keeps a sliding visibility window over a live conversation document that
//! the host keeps rewriting: only the newest entries stay visible, older ones
//! are revealed a batch at a time, and every write is reconciled against what
//! the host renders next.
//!
//! The [`engine::Engine`] is generic over the host [`dom::Document`]. The
//! in-memory host in [`dom::memory`] and the synthetic page in [`sim`] drive
//! it headlessly, which is what the `chatwin` binary and the tests do.

pub mod config;
pub mod detect;
pub mod dom;
pub mod engine;
pub mod lifecycle;
pub mod locator;
pub mod logging;
pub mod model;
pub mod reconciler;
pub mod scheduler;
pub mod sim;
pub mod ui;

#[cfg(test)]
mod tests;
