use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use autoreply::host::{MemoryTree, UiEvent};
use autoreply::{
    Controller, EngineOptions, NodeSpec, NotificationSink, RunState, Settings, SharedSettings,
    StartError,
};

#[derive(Default)]
struct RecordingSink(Mutex<Vec<String>>);

impl RecordingSink {
    fn statuses(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn update(&self, status: &str) {
        self.0.lock().unwrap().push(status.to_string());
    }
}

fn live_room() -> NodeSpec {
    NodeSpec::new("Root")
        .child(
            NodeSpec::new("android.widget.EditText")
                .with_text("Say something...")
                .clickable(true),
        )
        .child(NodeSpec::new("android.widget.Button").with_text("Send").clickable(true))
}

fn settings(reply_text: &str, human_mode: bool) -> SharedSettings {
    SharedSettings::new(Settings {
        reply_text: reply_text.to_string(),
        interval_ms: 1_000,
        human_mode,
        typo_rate: 0.0,
        ..Default::default()
    })
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn start_without_content_is_refused() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(
        Arc::new(settings(" \n\n", true)),
        Box::new(MemoryTree::new(live_room())),
        sink.clone(),
        EngineOptions { seed: Some(1) },
    )
    .unwrap();

    assert_eq!(controller.start(), Err(StartError::NotConfigured));
    assert!(!controller.is_running());
    assert_eq!(controller.state(), RunState::Stopped);
    assert_eq!(sink.statuses(), ["no reply content configured"]);
}

#[test]
fn runs_a_full_cycle_then_stops() {
    let sink = Arc::new(RecordingSink::default());
    let tree = MemoryTree::new(live_room());
    let events = tree.events();
    let controller = Controller::new(
        Arc::new(settings("hello", false)),
        Box::new(tree),
        sink.clone(),
        EngineOptions { seed: Some(2) },
    )
    .unwrap();

    controller.start().unwrap();
    assert!(controller.is_running());

    let submitted = wait_until(Duration::from_secs(5), || events.len() >= 3);
    assert!(submitted, "first cycle did not finish: {:?}", events.snapshot());

    let recorded = events.snapshot();
    let first_cycle = &recorded[..3];
    assert!(matches!(first_cycle[0], UiEvent::Click { .. }));
    assert_eq!(
        first_cycle[1],
        UiEvent::SetText {
            id: autoreply::SurfaceId(1),
            text: "hello".to_string()
        }
    );
    assert_eq!(
        first_cycle[2],
        UiEvent::Click {
            id: autoreply::SurfaceId(2)
        }
    );

    controller.stop();
    controller.stop();
    assert!(!controller.is_running());

    let stopped = sink
        .statuses()
        .iter()
        .filter(|s| s.as_str() == "auto reply stopped")
        .count();
    assert_eq!(stopped, 1);
    controller.shutdown();
}

#[test]
fn stop_cancels_pending_continuation() {
    let tree = MemoryTree::new(live_room());
    let events = tree.events();
    let controller = Controller::new(
        Arc::new(settings("a fairly long reply to type", true)),
        Box::new(tree),
        Arc::new(RecordingSink::default()),
        EngineOptions { seed: Some(3) },
    )
    .unwrap();

    controller.start().unwrap();
    // The focus tap happens right away; typing waits for the focus-settle delay.
    assert!(wait_until(Duration::from_secs(2), || !events.is_empty()));
    controller.stop();
    let at_stop = events.len();

    thread::sleep(Duration::from_millis(800));

    assert_eq!(events.len(), at_stop);
    assert!(events.texts().len() < "a fairly long reply to type".len());
    assert!(!controller.is_running());
}

#[test]
fn restart_uses_fresh_settings_and_counter() {
    let shared = settings("first", false);
    let tree = MemoryTree::new(live_room());
    let events = tree.events();
    let controller = Controller::new(
        Arc::new(shared.clone()),
        Box::new(tree),
        Arc::new(RecordingSink::default()),
        EngineOptions { seed: Some(4) },
    )
    .unwrap();

    controller.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || events
        .texts()
        .contains(&"first".to_string())));
    controller.stop();

    shared.update(|s| s.reply_text = "second".to_string());
    controller.start().unwrap();
    assert!(controller.cycles() <= 1);
    assert!(wait_until(Duration::from_secs(5), || events
        .texts()
        .contains(&"second".to_string())));
    assert_eq!(controller.cycles(), 1);
}

#[test]
fn dropping_the_controller_joins_the_worker() {
    let controller = Controller::new(
        Arc::new(settings("bye", true)),
        Box::new(MemoryTree::new(live_room())),
        Arc::new(RecordingSink::default()),
        EngineOptions::default(),
    )
    .unwrap();
    controller.start().unwrap();
    drop(controller);
}

#[test]
fn running_status_precedes_first_cycle_status() {
    let sink = Arc::new(RecordingSink::default());
    let controller = Controller::new(
        Arc::new(settings("hello", false)),
        Box::new(MemoryTree::new(live_room())),
        sink.clone(),
        EngineOptions { seed: Some(5) },
    )
    .unwrap();

    controller.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || sink.statuses().len() >= 2));

    let statuses = sink.statuses();
    assert_eq!(statuses[0], "auto reply running (1 replies)");
    assert_eq!(statuses[1], "auto reply running, cycle #1");
    controller.shutdown();
}

#[test]
fn restart_while_running_keeps_cycling() {
    let tree = MemoryTree::new(live_room());
    let events = tree.events();
    let controller = Controller::new(
        Arc::new(settings("again", false)),
        Box::new(tree),
        Arc::new(RecordingSink::default()),
        EngineOptions { seed: Some(6) },
    )
    .unwrap();

    controller.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || !events.is_empty()));

    controller.start().unwrap();
    assert!(controller.is_running());
    assert!(controller.cycles() <= 1);

    let at_restart = events.len();
    assert!(
        wait_until(Duration::from_secs(2), || events.len() > at_restart),
        "no UI activity after restart: {:?}",
        events.snapshot()
    );
    assert!(controller.is_running());
    controller.shutdown();
}

#[test]
fn racing_stop_and_start_never_leaves_a_dead_run() {
    let tree = MemoryTree::new(live_room());
    let events = tree.events();
    let controller = Controller::new(
        Arc::new(settings("race", false)),
        Box::new(tree),
        Arc::new(RecordingSink::default()),
        EngineOptions { seed: Some(7) },
    )
    .unwrap();

    for round in 0..10 {
        controller.start().unwrap();
        let barrier = Barrier::new(2);

        thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                controller.stop();
            });
            barrier.wait();
            controller.start().unwrap();
        });

        if controller.is_running() {
            let before = events.len();
            assert!(
                wait_until(Duration::from_millis(1_500), || events.len() > before),
                "round {round}: reported running but no cycle ran"
            );
        } else {
            // Let a step that was already executing finish.
            thread::sleep(Duration::from_millis(50));
            let before = events.len();
            thread::sleep(Duration::from_millis(300));
            assert_eq!(events.len(), before, "round {round}: stopped run kept acting");
        }
        controller.stop();
    }
    controller.shutdown();
}
