//! Tests for the engine's event handling and passes.

use super::*;
use crate::dom::{MemoryDocument, NavigationKind, Rect};
use crate::sim::{ChatPage, Simulation};
use serde_json::json;

const LOCATION: &str = "https://chat.example.com/c/abc";

fn started(turns: usize) -> Simulation {
    let mut sim = Simulation::new(LOCATION, turns).expect("default patterns");
    sim.start().expect("settles");
    sim
}

fn fixed_threshold(sim: &mut Simulation) {
    let change = SettingsChange::from_values(match json!({"hideOldestOnNew": false}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    });
    sim.deliver(HostEvent::SettingsChanged(change));
    sim.settle().expect("settles");
}

fn bare_engine(doc: MemoryDocument) -> Engine<MemoryDocument> {
    Engine::new(
        doc,
        Locator::chat_defaults().expect("default patterns"),
        ManualTicks::default(),
        MemoryStore::new(),
    )
}

#[test]
fn start_attaches_and_schedules_one_pass() {
    let (doc, _) = ChatPage::build(LOCATION, 3);
    let mut engine = bare_engine(doc);
    assert_eq!(engine.lifecycle_state(), LifecycleState::Uninitialized);

    engine.start();
    assert_eq!(engine.lifecycle_state(), LifecycleState::Attached);
    assert!(engine.scheduler().is_pending());
    assert_eq!(engine.scheduler().ticks().outstanding(), 1);
    assert_eq!(engine.route_path(), Some("/c/abc"));

    engine.start();
    assert_eq!(engine.scheduler().requests(), 1, "second start is ignored");
}

#[test]
fn tick_without_request_runs_nothing() {
    let mut sim = started(3);
    assert_eq!(sim.engine_mut().tick(), None);
}

#[test]
fn unavailable_store_falls_back_to_defaults() {
    let mut sim = Simulation::with_parts(
        LOCATION,
        25,
        Locator::chat_defaults().expect("default patterns"),
        MemoryStore::unavailable(),
    );
    sim.start().expect("settles");
    assert_eq!(*sim.engine().settings(), Settings::default());
    assert_eq!(sim.engine().window().hidden_top(), 15);
}

#[test]
fn stored_settings_are_loaded_at_start() {
    let values = match json!({"maxVisible": "3", "batchSize": 2}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    let mut sim = Simulation::with_parts(
        LOCATION,
        8,
        Locator::chat_defaults().expect("default patterns"),
        MemoryStore::with_values(values),
    );
    sim.start().expect("settles");
    assert_eq!(sim.engine().window().hidden_top(), 5);
    assert_eq!(
        sim.engine().placeholder_text(),
        Some("5 older messages hidden — click to load next 2")
    );
}

#[test]
fn pass_is_skipped_off_chat_pages() {
    let mut doc = MemoryDocument::new(LOCATION);
    let body = doc.body().expect("body");
    let main = doc.element("main", &[]);
    doc.append_child(body, main);
    let turn = doc.element("article", &[("data-testid", "conversation-turn-0")]);
    doc.append_child(main, turn);

    let mut engine = bare_engine(doc);
    engine.start();
    let before = engine.document().stats();
    assert_eq!(engine.tick(), Some(PassOutcome::Skipped));
    assert_eq!(engine.document().stats(), before);
    assert_eq!(engine.status(), None);
}

#[test]
fn empty_conversation_reports_zero_status() {
    let sim = started(0);
    assert_eq!(sim.engine().status(), Some("visible 0/0"));
    assert_eq!(sim.engine().placeholder_text(), None);
    assert!(sim.engine().window().saw_zero());
}

#[test]
fn repeated_pass_is_unchanged_and_writes_nothing() {
    let mut sim = started(25);
    let before = sim.document().stats();
    let outcome = sim.engine_mut().run_pass();
    assert_eq!(
        outcome,
        PassOutcome::Unchanged {
            total: 25,
            hidden_top: 15
        }
    );
    assert_eq!(sim.document().stats().since(&before), Default::default());
}

#[test]
fn streaming_does_not_move_the_window() {
    let mut sim = started(25);
    let before = sim.engine().window().clone();
    sim.host(|page, doc| page.stream(doc, "token"));
    sim.settle().expect("settles");
    assert_eq!(*sim.engine().window(), before);
}

#[test]
fn growth_hides_oldest_visible_on_new_turn() {
    let mut sim = started(10);
    assert_eq!(sim.engine().window().hidden_top(), 0);
    sim.host(|page, doc| page.append_turn(doc));
    sim.settle().expect("settles");
    let window = sim.engine().window();
    assert_eq!(window.hidden_top(), 1);
    assert_eq!(window.visible_limit(), 10);
    assert_eq!(sim.hidden_turns(), vec![sim.page().turns()[0]]);
}

#[test]
fn reveal_updates_document_before_the_pass() {
    let mut sim = started(25);
    fixed_threshold(&mut sim);
    sim.engine_mut().reveal_older();

    assert!(sim.engine().scheduler().is_pending());
    assert_eq!(sim.hidden_turns().len(), 5);
    assert_eq!(sim.engine().status(), Some("visible 20/25"));
    assert_eq!(
        sim.engine().placeholder_text(),
        Some("5 older messages hidden — click to load next 10")
    );
}

#[test]
fn reveal_with_no_entries_is_ignored() {
    let mut sim = started(0);
    let requests = sim.engine().scheduler().requests();
    sim.engine_mut().reveal_older();
    assert_eq!(sim.engine().scheduler().requests(), requests);
}

#[test]
fn collapse_scrolls_container_to_bottom() {
    let mut sim = started(25);
    fixed_threshold(&mut sim);
    sim.engine_mut().reveal_older();
    sim.settle().expect("settles");

    sim.engine_mut().collapse_to_threshold();
    let container = sim.page().container();
    assert_eq!(sim.engine().window().hidden_top(), 15);
    assert_eq!(sim.document().scroll_top(container), 25.0 * 120.0 - 600.0);
}

#[test]
fn refused_scroll_is_swallowed() {
    let mut sim = started(25);
    sim.host(|_, doc| doc.set_refuse_scroll(true));
    sim.engine_mut().reveal_older();
    sim.engine_mut().collapse_to_threshold();
    assert_eq!(sim.engine().window().hidden_top(), 15);
}

#[test]
fn navigation_resets_and_rediscovers() {
    let mut sim = started(25);
    sim.engine_mut().reveal_older();
    sim.settle().expect("settles");
    assert_eq!(sim.engine().window().visible_limit(), 20);

    sim.host(|page, doc| {
        doc.navigate(NavigationKind::Push, "/c/def#latest");
        page.load(doc, 7);
    });
    sim.settle().expect("settles");

    let window = sim.engine().window();
    assert_eq!(sim.engine().route_path(), Some("/c/def"));
    assert_eq!(window.total(), 7);
    assert_eq!(window.hidden_top(), 0);
    assert_eq!(window.visible_limit(), 10);
    assert_eq!(sim.engine().lifecycle_state(), LifecycleState::Attached);
}

#[test]
fn fragment_only_navigation_is_not_a_route_change() {
    let mut sim = started(25);
    sim.engine_mut().reveal_older();
    sim.settle().expect("settles");
    sim.host(|_, doc| doc.navigate(NavigationKind::Replace, "/c/abc#bottom"));
    sim.settle().expect("settles");
    assert_eq!(sim.engine().window().hidden_top(), 5);
}

#[test]
fn leaving_conversation_routes_removes_the_bar() {
    let mut sim = started(12);
    let bar = sim.engine().refs().bar.expect("bar on /c/");
    sim.host(|_, doc| doc.navigate(NavigationKind::Push, "/gpts"));
    sim.settle().expect("settles");
    assert!(sim.engine().refs().bar.is_none());
    assert!(!sim.document().is_connected(bar.root));
}

#[test]
fn route_change_without_subscription_is_seen_by_the_pass() {
    let (mut doc, _) = ChatPage::build(LOCATION, 25);
    doc.set_refuse_observers(true);
    let mut engine = bare_engine(doc);
    engine.start();
    engine.tick();
    engine.reveal_older();
    assert_eq!(engine.window().hidden_top(), 5);

    engine.document_mut().navigate(NavigationKind::Pop, "/c/xyz");
    engine.run_pass();
    assert_eq!(engine.route_path(), Some("/c/xyz"));
    assert_eq!(engine.window().hidden_top(), 15);
}

#[test]
fn container_replacement_reattaches_and_rehides() {
    let mut sim = started(25);
    let old = sim.engine().refs().container;
    sim.host(|page, doc| page.replace_container(doc));
    sim.settle().expect("settles");

    assert_ne!(sim.engine().refs().container, old);
    assert_eq!(sim.engine().refs().container, Some(sim.page().container()));
    assert_eq!(sim.engine().lifecycle_state(), LifecycleState::Attached);
    assert_eq!(sim.hidden_turns().len(), 15);
    assert!(sim.engine().placeholder_text().is_some());
}

#[test]
fn thread_replacement_reattaches_sentinel_and_rehides() {
    let mut sim = started(25);
    let container = sim.engine().refs().container;
    let old_thread = sim.engine().refs().thread;
    let old_sentinel = sim.engine().refs().sentinel.expect("sentinel with autoload on");

    sim.host(|page, doc| page.replace_thread(doc));
    sim.settle().expect("settles");

    let refs = *sim.engine().refs();
    let thread = sim.page().thread();
    assert_eq!(refs.container, container, "container survives");
    assert_ne!(refs.thread, old_thread);
    assert_eq!(refs.thread, Some(thread));
    assert_eq!(sim.engine().lifecycle_state(), LifecycleState::Attached);

    let sentinel = refs.sentinel.expect("sentinel recreated");
    assert_ne!(sentinel, old_sentinel);
    assert!(!sim.document().is_connected(old_sentinel));
    assert_eq!(sim.document().children(thread).first(), Some(&sentinel));

    assert_eq!(sim.hidden_turns(), sim.page().turns()[..15].to_vec());
    let placeholder = refs.placeholder.expect("placeholder");
    assert_eq!(sim.document().parent(placeholder), Some(thread));
    assert_eq!(
        sim.document().next_sibling(placeholder),
        Some(sim.page().turns()[15])
    );

    // Sources follow the new thread.
    sim.host(|page, doc| page.append_turn(doc));
    sim.settle().expect("settles");
    assert_eq!(sim.hidden_turns().len(), 16);
}

#[test]
fn late_container_is_discovered() {
    let mut doc = MemoryDocument::new(LOCATION);
    let body = doc.body().expect("body");
    let composer = doc.element("textarea", &[]);
    doc.append_child(body, composer);
    let mut engine = bare_engine(doc);
    engine.start();
    engine.tick();
    assert_eq!(engine.lifecycle_state(), LifecycleState::Discovering);

    let page = ChatPage::mount(engine.document_mut(), 12);
    for _ in 0..16 {
        let events = engine.document_mut().drain_events();
        let tick = engine.scheduler_mut().ticks_mut().take();
        if events.is_empty() && !tick {
            break;
        }
        for event in events {
            engine.handle(event);
        }
        if tick {
            engine.handle(HostEvent::Tick);
        }
    }
    assert_eq!(engine.lifecycle_state(), LifecycleState::Attached);
    assert_eq!(engine.refs().container, Some(page.container()));
    assert_eq!(engine.window().hidden_top(), 2);
}

#[test]
fn removed_setting_reverts_to_default() {
    let mut sim = Simulation::with_parts(
        LOCATION,
        25,
        Locator::chat_defaults().expect("default patterns"),
        MemoryStore::with_values(match json!({"maxVisible": 3, "hideOldestOnNew": false}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }),
    );
    sim.start().expect("settles");
    assert_eq!(sim.engine().window().hidden_top(), 22);

    let requests = sim.engine().scheduler().requests();
    let removed = SettingsChange {
        keys: vec!["maxVisible".to_string()],
        values: match json!({"hideOldestOnNew": false}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        },
    };
    sim.deliver(HostEvent::SettingsChanged(removed));
    assert_eq!(sim.engine().settings().max_visible, 10);
    assert!(sim.engine().scheduler().requests() > requests);

    sim.settle().expect("settles");
    assert_eq!(sim.engine().window().hidden_top(), 15);
    assert_eq!(sim.hidden_turns().len(), 15);
}

#[test]
fn unrecognised_settings_change_is_ignored() {
    let mut sim = started(3);
    let requests = sim.engine().scheduler().requests();
    let change = SettingsChange::from_values(match json!({"theme": "dark"}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    });
    sim.deliver(HostEvent::SettingsChanged(change));
    assert_eq!(sim.engine().scheduler().requests(), requests);
}

#[test]
fn autoload_reveals_only_when_scrollable() {
    let mut sim = started(25);
    let sentinel = sim.engine().refs().sentinel.expect("sentinel with autoload");
    sim.host(|_, doc| doc.set_intersecting(sentinel, true));
    sim.settle().expect("settles");
    assert_eq!(sim.engine().window().hidden_top(), 5);

    let values = match json!({"maxVisible": 2}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    let mut short = Simulation::with_parts(
        LOCATION,
        4,
        Locator::chat_defaults().expect("default patterns"),
        MemoryStore::with_values(values),
    );
    short.start().expect("settles");
    assert_eq!(short.engine().window().hidden_top(), 2);
    let sentinel = short.engine().refs().sentinel.expect("sentinel");
    short.host(|_, doc| doc.set_intersecting(sentinel, true));
    short.settle().expect("settles");
    assert_eq!(
        short.engine().window().hidden_top(),
        2,
        "4 turns fit in the scroller, no autoload"
    );
}

#[test]
fn press_outside_handle_does_not_drag() {
    let mut sim = started(3);
    let bar = sim.engine().refs().bar.expect("bar");
    sim.host(|_, doc| {
        doc.set_rect(
            bar.pill,
            Rect {
                left: 10.0,
                top: 10.0,
                width: 200.0,
                height: 40.0,
            },
        )
    });
    sim.deliver(HostEvent::Pointer(PointerEvent {
        phase: PointerPhase::Down,
        target: bar.status,
        x: 20.0,
        y: 20.0,
    }));
    assert!(!sim.engine().drag_state().is_dragging());

    sim.deliver(HostEvent::Pointer(PointerEvent {
        phase: PointerPhase::Down,
        target: bar.handle,
        x: 20.0,
        y: 20.0,
    }));
    assert!(sim.engine().drag_state().is_dragging());
    sim.deliver(HostEvent::Pointer(PointerEvent {
        phase: PointerPhase::Move,
        target: bar.handle,
        x: 5000.0,
        y: -50.0,
    }));
    let rect = sim.document().bounding_rect(bar.pill);
    assert_eq!((rect.left, rect.top), (1280.0 - 200.0 - 4.0, 4.0));
}
