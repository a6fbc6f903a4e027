use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use autoreply::cycle::{Continuation, CycleMachine, Next};
use autoreply::host::{EventLog, MemoryTree, UiEvent};
use autoreply::locator::LocatorProfile;
use autoreply::{CycleConfig, LogSink, NodeSpec, ReplyPool, Surface, SurfaceId, UiSnapshot, UiTree};

const INPUT_ROW: u64 = 1;
const EDIT_TEXT: u64 = 4;
const SEND: u64 = 5;

fn live_room() -> NodeSpec {
    NodeSpec::new("android.widget.FrameLayout")
        .with_id(0)
        .child(
            NodeSpec::new("android.widget.LinearLayout")
                .with_id(INPUT_ROW)
                .clickable(true)
                .child(
                    NodeSpec::new("android.widget.FrameLayout")
                        .with_id(2)
                        .enabled(false)
                        .child(
                            NodeSpec::new("android.widget.TextView")
                                .with_id(3)
                                .with_text("说点什么")
                                .enabled(false),
                        ),
                )
                .child(
                    NodeSpec::new("android.widget.EditText")
                        .with_id(EDIT_TEXT)
                        .focused(true),
                ),
        )
        .child(
            NodeSpec::new("android.widget.Button")
                .with_id(SEND)
                .with_text("发送")
                .clickable(true),
        )
}

fn config(replies: &str, human: bool) -> CycleConfig {
    CycleConfig {
        base_interval_ms: 2_000,
        human_mode_enabled: human,
        typo_rate: 0.0,
        pool: ReplyPool::from_text(replies),
        locator: LocatorProfile::default(),
    }
}

/// Run continuations until the machine hands back `BeginCycle`.
fn run_one_cycle(
    machine: &mut CycleMachine,
    tree: &mut dyn UiTree,
    rng: &mut StdRng,
) -> Vec<(&'static str, Duration)> {
    let mut trail = Vec::new();
    let mut continuation = Continuation::BeginCycle;
    for _ in 0..10_000 {
        let label = continuation.label();
        let Next {
            delay,
            continuation: next,
        } = machine.run(continuation, tree, &LogSink, rng);
        trail.push((label, delay));
        if matches!(next, Continuation::BeginCycle) {
            return trail;
        }
        continuation = next;
    }
    panic!("cycle did not finish");
}

#[test]
fn full_cycle_taps_types_and_submits() {
    let mut tree = MemoryTree::new(live_room());
    let events = tree.events();
    let mut machine = CycleMachine::new(config("你好", false));
    let mut rng = StdRng::seed_from_u64(1);

    let trail = run_one_cycle(&mut machine, &mut tree, &mut rng);

    assert_eq!(
        events.snapshot(),
        vec![
            UiEvent::Click {
                id: SurfaceId(INPUT_ROW)
            },
            UiEvent::SetText {
                id: SurfaceId(EDIT_TEXT),
                text: "你好".to_string()
            },
            UiEvent::Click {
                id: SurfaceId(SEND)
            },
        ]
    );

    let labels: Vec<_> = trail.iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, ["begin_cycle", "start_typing", "type", "submit"]);

    let (_, focus) = trail[0];
    assert!(focus >= Duration::from_millis(200) && focus < Duration::from_millis(400));
    let (_, review) = trail[2];
    assert!(review >= Duration::from_millis(300) && review < Duration::from_millis(700));
    let (_, interval) = trail[3];
    assert!(interval >= Duration::from_millis(1_000));
    assert_eq!(machine.cycles(), 1);
}

#[test]
fn human_cycle_types_character_by_character() {
    let mut tree = MemoryTree::new(live_room());
    let events = tree.events();
    let mut machine = CycleMachine::new(config("abc", true));
    let mut rng = StdRng::seed_from_u64(2);

    run_one_cycle(&mut machine, &mut tree, &mut rng);

    assert_eq!(events.texts(), ["a", "ab", "abc"]);
    let snapshot = tree.snapshot();
    let field = snapshot.node(snapshot.find(SurfaceId(EDIT_TEXT)).expect("edit text"));
    assert_eq!(field.text.as_deref(), Some("abc"));
}

#[test]
fn counter_increments_once_per_cycle() {
    let mut tree = MemoryTree::new(live_room());
    let mut machine = CycleMachine::new(config("one\ntwo", false));
    let mut rng = StdRng::seed_from_u64(3);

    for expected in 1..=3 {
        run_one_cycle(&mut machine, &mut tree, &mut rng);
        assert_eq!(machine.cycles(), expected);
    }
}

struct NoForeground;

impl UiTree for NoForeground {
    fn current_root(&mut self) -> Option<UiSnapshot> {
        None
    }

    fn set_text(&mut self, _surface: &Surface, _text: &str) -> bool {
        panic!("no surface to type into");
    }

    fn click(&mut self, _surface: &Surface) -> bool {
        panic!("no surface to click");
    }
}

#[test]
fn missing_tree_reschedules_next_cycle() {
    let mut machine = CycleMachine::new(config("hi", true));
    let mut rng = StdRng::seed_from_u64(4);

    let next = machine.run(Continuation::BeginCycle, &mut NoForeground, &LogSink, &mut rng);

    assert!(matches!(next.continuation, Continuation::BeginCycle));
    assert!(next.delay >= Duration::from_millis(1_000));
    assert_eq!(machine.cycles(), 1);
}

#[test]
fn missing_input_surface_reschedules_without_mutations() {
    let mut tree = MemoryTree::new(
        NodeSpec::new("Root").child(NodeSpec::new("TextView").with_text("Live now")),
    );
    let events = tree.events();
    let mut machine = CycleMachine::new(config("hi", true));
    let mut rng = StdRng::seed_from_u64(5);

    let next = machine.run(Continuation::BeginCycle, &mut tree, &LogSink, &mut rng);

    assert!(matches!(next.continuation, Continuation::BeginCycle));
    assert!(events.is_empty());
}

#[test]
fn empty_pool_reschedules_without_mutations() {
    let mut tree = MemoryTree::new(live_room());
    let events = tree.events();
    let mut machine = CycleMachine::new(config("", true));
    let mut rng = StdRng::seed_from_u64(6);

    let next = machine.run(Continuation::BeginCycle, &mut tree, &LogSink, &mut rng);

    assert!(matches!(next.continuation, Continuation::BeginCycle));
    assert!(events.is_empty());
}

#[test]
fn missing_submit_control_still_rescheduled() {
    let room = NodeSpec::new("Root").child(NodeSpec::new("android.widget.EditText"));
    let mut tree = MemoryTree::new(room);
    let events = tree.events();
    let mut machine = CycleMachine::new(config("ok", false));
    let mut rng = StdRng::seed_from_u64(7);

    let trail = run_one_cycle(&mut machine, &mut tree, &mut rng);

    assert_eq!(trail.last().map(|(l, _)| *l), Some("submit"));
    assert_eq!(events.texts(), ["ok"]);
}

/// Accepts clicks but rejects every text replacement.
struct ReadOnlyField {
    inner: MemoryTree,
    rejected: Arc<Mutex<Vec<String>>>,
}

impl UiTree for ReadOnlyField {
    fn current_root(&mut self) -> Option<UiSnapshot> {
        self.inner.current_root()
    }

    fn set_text(&mut self, _surface: &Surface, text: &str) -> bool {
        self.rejected.lock().unwrap().push(text.to_string());
        false
    }

    fn click(&mut self, surface: &Surface) -> bool {
        self.inner.click(surface)
    }
}

#[test]
fn failed_text_replacement_does_not_stall_typing() {
    let inner = MemoryTree::new(live_room());
    let events: EventLog = inner.events();
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let mut tree = ReadOnlyField {
        inner,
        rejected: rejected.clone(),
    };
    let mut machine = CycleMachine::new(config("hey", true));
    let mut rng = StdRng::seed_from_u64(8);

    run_one_cycle(&mut machine, &mut tree, &mut rng);

    assert_eq!(*rejected.lock().unwrap(), ["h", "he", "hey"]);
    assert_eq!(
        events.snapshot().last(),
        Some(&UiEvent::Click {
            id: SurfaceId(SEND)
        })
    );
}

struct Exploding;

impl UiTree for Exploding {
    fn current_root(&mut self) -> Option<UiSnapshot> {
        panic!("host bridge crashed");
    }

    fn set_text(&mut self, _surface: &Surface, _text: &str) -> bool {
        false
    }

    fn click(&mut self, _surface: &Surface) -> bool {
        false
    }
}

#[test]
fn panicking_host_is_contained() {
    let mut machine = CycleMachine::new(config("hi", true));
    let mut rng = StdRng::seed_from_u64(9);

    let next = machine.run(Continuation::BeginCycle, &mut Exploding, &LogSink, &mut rng);

    assert!(matches!(next.continuation, Continuation::BeginCycle));
}
