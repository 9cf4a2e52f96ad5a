//! JSON-lines replay scripts.
//!
//! One step per line, tagged by `op`. Blank lines and `#` comments are
//! skipped.
//!
//! ```text
//! {"op": "load", "turns": 25}
//! {"op": "click", "target": "show_older"}
//! {"op": "append", "count": 2}
//! {"op": "navigate", "to": "/c/other", "turns": 7}
//! {"op": "settings", "values": {"maxVisible": 5}}
//! ```
//!
//! Every step is followed by a settle, then a [`Snapshot`].

use super::Simulation;
use crate::config::store::SettingsStore;
use crate::dom::{
    Document, HostEvent, NavigationKind, NodeId, PointerEvent, PointerPhase,
};
use crate::model::{ScriptError, SettingsMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn one() -> usize {
    1
}

/// How a scripted navigation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStep {
    /// History push.
    #[default]
    Push,
    /// History replace.
    Replace,
    /// Back/forward.
    Pop,
}

impl From<NavigationStep> for NavigationKind {
    fn from(step: NavigationStep) -> Self {
        match step {
            NavigationStep::Push => NavigationKind::Push,
            NavigationStep::Replace => NavigationKind::Replace,
            NavigationStep::Pop => NavigationKind::Pop,
        }
    }
}

/// Chrome a `click` step can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickTarget {
    /// Cutoff placeholder.
    Placeholder,
    /// Bar "Show older" button.
    ShowOlder,
    /// Bar "Collapse" button.
    Collapse,
}

impl ClickTarget {
    fn name(&self) -> &'static str {
        match self {
            ClickTarget::Placeholder => "placeholder",
            ClickTarget::ShowOlder => "show older button",
            ClickTarget::Collapse => "collapse button",
        }
    }
}

/// One scripted host action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Replace the conversation with `turns` fresh turns.
    Load {
        /// Turn count.
        turns: usize,
    },
    /// Append new turns.
    Append {
        /// Turn count (default 1).
        #[serde(default = "one")]
        count: usize,
    },
    /// Remove the oldest turns.
    RemoveOldest {
        /// Turn count (default 1).
        #[serde(default = "one")]
        count: usize,
    },
    /// Stream text into the newest turn.
    Stream {
        /// Chunk text.
        text: String,
    },
    /// Change the route, optionally rendering a new conversation.
    Navigate {
        /// New location.
        to: String,
        /// Push, replace or pop.
        #[serde(default)]
        kind: NavigationStep,
        /// Turns of the conversation rendered at the new route.
        #[serde(default)]
        turns: Option<usize>,
    },
    /// Click on chrome.
    Click {
        /// What to click.
        target: ClickTarget,
    },
    /// Scroll the thread to its top so the sentinel intersects.
    ScrollTop,
    /// Re-render the conversation container.
    ReplaceContainer,
    /// Remove the control bar from the document.
    EvictBar,
    /// Write settings to the store and deliver the change.
    Settings {
        /// Raw values, as the settings editor would write them.
        values: SettingsMap,
    },
    /// Drag the bar by its handle.
    Drag {
        /// Press point `[x, y]`.
        from: (f64, f64),
        /// Release point `[x, y]`.
        to: (f64, f64),
    },
}

/// State report after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Entries discovered.
    pub total: usize,
    /// Entries inside the window.
    pub visible: usize,
    /// Oldest entries hidden.
    pub hidden_top: usize,
    /// Growth-policy ceiling.
    pub visible_limit: usize,
    /// Placeholder label, if shown.
    pub placeholder: Option<String>,
    /// Status readout, if the bar exists.
    pub status: Option<String>,
    /// Lifecycle state.
    pub state: String,
    /// Last observed route.
    pub path: Option<String>,
}

/// Parse a JSON-lines script.
///
/// # Errors
///
/// Returns [`ScriptError::Parse`] naming the 1-based line of the first bad step.
pub fn parse_script(source: &str) -> Result<Vec<Step>, ScriptError> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| ScriptError::Parse {
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Start the simulation, then run every step, collecting a snapshot per step.
///
/// # Errors
///
/// Returns the first step failure.
pub fn run_script<S: SettingsStore>(
    sim: &mut Simulation<S>,
    steps: &[Step],
) -> Result<Vec<Snapshot>, ScriptError> {
    sim.start()?;
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| sim.run_step(index + 1, step))
        .collect()
}

impl<S: SettingsStore> Simulation<S> {
    /// Perform one step (`number` is 1-based, for errors), settle, report.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] if the step targets missing chrome, the
    /// settings store refuses a write, or the loop does not settle.
    pub fn run_step(&mut self, number: usize, step: &Step) -> Result<Snapshot, ScriptError> {
        debug!(step = number, ?step, "script step");
        match step {
            Step::Load { turns } => self.host(|page, doc| page.load(doc, *turns)),
            Step::Append { count } => self.host(|page, doc| page.append_turns(doc, *count)),
            Step::RemoveOldest { count } => self.host(|page, doc| {
                for _ in 0..*count {
                    page.remove_oldest(doc);
                }
            }),
            Step::Stream { text } => {
                self.host(|page, doc| page.stream(doc, text))
                    .ok_or(ScriptError::MissingTarget {
                        step: number,
                        what: "turn",
                    })?;
            }
            Step::Navigate { to, kind, turns } => {
                self.engine_mut()
                    .document_mut()
                    .navigate((*kind).into(), to.as_str());
                if let Some(turns) = turns {
                    self.host(|page, doc| page.load(doc, *turns));
                }
            }
            Step::Click { target } => {
                let node = self.click_target(*target).ok_or(ScriptError::MissingTarget {
                    step: number,
                    what: target.name(),
                })?;
                self.deliver(HostEvent::Click(node));
            }
            Step::ScrollTop => {
                let sentinel = self
                    .connected(self.engine().refs().sentinel)
                    .ok_or(ScriptError::MissingTarget {
                        step: number,
                        what: "sentinel",
                    })?;
                self.engine_mut()
                    .document_mut()
                    .set_intersecting(sentinel, true);
            }
            Step::ReplaceContainer => self.host(|page, doc| page.replace_container(doc)),
            Step::EvictBar => {
                let root = self
                    .connected(self.engine().refs().bar.map(|bar| bar.root))
                    .ok_or(ScriptError::MissingTarget {
                        step: number,
                        what: "bar",
                    })?;
                self.engine_mut().document_mut().remove(root);
            }
            Step::Settings { values } => {
                let change = self.engine_mut().store_mut().set(values.clone())?;
                if !change.keys.is_empty() {
                    self.deliver(HostEvent::SettingsChanged(change));
                }
            }
            Step::Drag { from, to } => {
                let handle = self
                    .connected(self.engine().refs().bar.map(|bar| bar.handle))
                    .ok_or(ScriptError::MissingTarget {
                        step: number,
                        what: "drag handle",
                    })?;
                for (phase, (x, y)) in [
                    (PointerPhase::Down, *from),
                    (PointerPhase::Move, *to),
                    (PointerPhase::Up, *to),
                ] {
                    self.deliver(HostEvent::Pointer(PointerEvent {
                        phase,
                        target: handle,
                        x,
                        y,
                    }));
                }
            }
        }
        self.settle()?;
        Ok(self.snapshot())
    }

    fn click_target(&self, target: ClickTarget) -> Option<NodeId> {
        let refs = self.engine().refs();
        let node = match target {
            ClickTarget::Placeholder => refs.placeholder,
            ClickTarget::ShowOlder => refs.bar.map(|bar| bar.show_older),
            ClickTarget::Collapse => refs.bar.map(|bar| bar.collapse),
        };
        self.connected(node)
    }

    fn connected(&self, node: Option<NodeId>) -> Option<NodeId> {
        node.filter(|&n| self.document().is_connected(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sim(turns: usize) -> Simulation {
        Simulation::new("https://chat.example.com/c/abc", turns).expect("default patterns")
    }

    #[test]
    fn parse_skips_blank_and_comment_lines() {
        let steps = parse_script(
            "# warm-up\n\n{\"op\": \"load\", \"turns\": 3}\n{\"op\": \"append\"}\n",
        )
        .expect("valid script");
        assert_eq!(
            steps,
            vec![Step::Load { turns: 3 }, Step::Append { count: 1 }]
        );
    }

    #[test]
    fn parse_error_reports_line() {
        let err = parse_script("{\"op\": \"load\", \"turns\": 3}\n\n{\"op\": \"fly\"}\n")
            .expect_err("unknown op");
        match err {
            ScriptError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("fly"), "message was {message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn step_json_shapes() {
        let steps = parse_script(
            r#"{"op": "navigate", "to": "/c/x", "kind": "pop"}
{"op": "click", "target": "show_older"}
{"op": "drag", "from": [10, 20], "to": [30.5, 40]}
{"op": "settings", "values": {"maxVisible": "5"}}"#,
        )
        .expect("valid script");
        assert_eq!(
            steps[0],
            Step::Navigate {
                to: "/c/x".into(),
                kind: NavigationStep::Pop,
                turns: None,
            }
        );
        assert_eq!(
            steps[1],
            Step::Click {
                target: ClickTarget::ShowOlder
            }
        );
        assert_eq!(
            steps[2],
            Step::Drag {
                from: (10.0, 20.0),
                to: (30.5, 40.0)
            }
        );
        assert!(matches!(&steps[3], Step::Settings { values } if values["maxVisible"] == "5"));
    }

    #[test]
    fn reveal_and_collapse_through_the_bar() {
        let mut sim = sim(0);
        let steps = parse_script(
            r#"{"op": "settings", "values": {"hideOldestOnNew": false}}
{"op": "load", "turns": 25}
{"op": "click", "target": "show_older"}
{"op": "click", "target": "placeholder"}
{"op": "click", "target": "collapse"}"#,
        )
        .expect("valid script");
        let snapshots = run_script(&mut sim, &steps).expect("script runs");
        let hidden: Vec<usize> = snapshots.iter().map(|s| s.hidden_top).collect();
        assert_eq!(hidden, vec![0, 15, 5, 0, 15]);
        assert_eq!(snapshots[1].status.as_deref(), Some("visible 10/25"));
        assert_eq!(snapshots[3].placeholder, None);
        assert_eq!(
            snapshots[4].placeholder.as_deref(),
            Some("15 older messages hidden — click to load next 10")
        );
    }

    #[test]
    fn missing_placeholder_is_an_error() {
        let mut sim = sim(3);
        sim.start().expect("settles");
        let err = sim
            .run_step(
                1,
                &Step::Click {
                    target: ClickTarget::Placeholder,
                },
            )
            .expect_err("nothing hidden");
        assert!(matches!(
            err,
            ScriptError::MissingTarget {
                step: 1,
                what: "placeholder"
            }
        ));
    }

    #[test]
    fn evicted_bar_comes_back() {
        let mut sim = sim(12);
        sim.start().expect("settles");
        let snapshot = sim.run_step(1, &Step::EvictBar).expect("bar present");
        let bar = sim.engine().refs().bar.expect("bar kept");
        assert!(sim.document().is_connected(bar.root));
        assert_eq!(snapshot.status.as_deref(), Some("visible 10/12"));
    }

    #[test]
    fn drag_moves_the_pill() {
        let mut sim = sim(1);
        sim.start().expect("settles");
        sim.run_step(
            1,
            &Step::Drag {
                from: (100.0, 100.0),
                to: (400.0, 300.0),
            },
        )
        .expect("handle present");
        let bar = sim.engine().refs().bar.expect("bar");
        let rect = sim.document().bounding_rect(bar.pill);
        assert_eq!((rect.left, rect.top), (300.0, 200.0));
        assert!(!sim.engine().drag_state().is_dragging());
    }

    #[test]
    fn settings_step_writes_the_store() {
        let mut sim = sim(20);
        sim.start().expect("settles");
        let values = match json!({"maxVisible": 4}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let snapshot = sim.run_step(1, &Step::Settings { values }).expect("store writable");
        assert_eq!(sim.engine().settings().max_visible, 4);
        assert_eq!(snapshot.visible, 10, "growth limit is never lowered by settings");
    }
}
