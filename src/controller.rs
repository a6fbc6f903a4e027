use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::{CycleConfig, SettingsStore};
use crate::cycle::{Continuation, CycleMachine};
use crate::error::StartError;
use crate::scheduler::DelayQueue;
use crate::tree::UiTree;

/// Receives human-readable status updates. Best effort; must not block.
pub trait NotificationSink: Send + Sync {
    fn update(&self, status: &str);
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn update(&self, status: &str) {
        info!(status, "status");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Run state plus an epoch that changes on every start and stop. A scheduled
/// continuation is only valid while the epoch it was armed under is current.
#[derive(Debug)]
struct Gate {
    state: RunState,
    epoch: u64,
}

#[derive(Debug)]
struct Shared {
    gate: Mutex<Gate>,
    cycles: AtomicU64,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        let gate = self.gate();
        gate.state == RunState::Running && gate.epoch == epoch
    }

    /// Record the cycle count of the run armed under `epoch`, unless a newer
    /// start or a stop has superseded it.
    fn publish_cycles(&self, epoch: u64, cycles: u64) {
        let gate = self.gate();
        if gate.state == RunState::Running && gate.epoch == epoch {
            self.cycles.store(cycles, Ordering::SeqCst);
        }
    }
}

enum Command {
    Start { epoch: u64, config: CycleConfig },
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Seed for every random draw the worker makes.
    pub seed: Option<u64>,
}

/// Owns the run/stop lifecycle and the worker thread that executes cycles.
pub struct Controller {
    settings: Arc<dyn SettingsStore>,
    sink: Arc<dyn NotificationSink>,
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        tree: Box<dyn UiTree>,
        sink: Arc<dyn NotificationSink>,
        options: EngineOptions,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            gate: Mutex::new(Gate {
                state: RunState::Stopped,
                epoch: 0,
            }),
            cycles: AtomicU64::new(0),
        });
        let (commands, inbox) = crossbeam_channel::unbounded();

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let worker = Worker {
            inbox,
            shared: shared.clone(),
            tree,
            sink: sink.clone(),
            rng,
        };
        let handle = thread::Builder::new()
            .name("autoreply-worker".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            settings,
            sink,
            shared,
            commands,
            worker: Some(handle),
        })
    }

    /// Load a fresh configuration and arm the first cycle immediately.
    ///
    /// Starting while already running restarts with the new configuration.
    pub fn start(&self) -> Result<(), StartError> {
        let config = CycleConfig::load(self.settings.as_ref());
        if config.pool.is_empty() {
            warn!("start refused: no reply content configured");
            self.sink.update("no reply content configured");
            return Err(StartError::NotConfigured);
        }

        let replies = config.pool.len();
        let interval_ms = config.base_interval_ms;
        let human_mode = config.human_mode_enabled;

        self.sink
            .update(&format!("auto reply running ({replies} replies)"));

        // Commands are sent under the gate so the worker sees them in epoch
        // order. `send` on an unbounded channel never blocks.
        let sent = {
            let mut gate = self.shared.gate();
            gate.epoch += 1;
            gate.state = RunState::Running;
            self.shared.cycles.store(0, Ordering::SeqCst);
            let sent = self
                .commands
                .send(Command::Start {
                    epoch: gate.epoch,
                    config,
                })
                .is_ok();
            if !sent {
                gate.state = RunState::Stopped;
            }
            sent
        };

        if !sent {
            warn!("start failed: worker thread is gone");
            self.sink.update("auto reply stopped");
            return Err(StartError::WorkerGone);
        }

        info!(replies, interval_ms, human_mode, "auto reply started");
        Ok(())
    }

    /// Stop the run. Pending continuations become inert. Idempotent.
    pub fn stop(&self) {
        let was_running = {
            let mut gate = self.shared.gate();
            let was_running = gate.state == RunState::Running;
            gate.state = RunState::Stopped;
            gate.epoch += 1;
            // The worker may already be gone during teardown.
            let _ = self.commands.send(Command::Stop);
            was_running
        };

        if was_running {
            info!("auto reply stopped");
            self.sink.update("auto reply stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.gate().state == RunState::Running
    }

    pub fn state(&self) -> RunState {
        self.shared.gate().state
    }

    /// Cycles begun in the current (or last) run.
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }

    /// Stop and join the worker thread.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.stop();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.teardown();
        }
    }
}

struct Scheduled {
    epoch: u64,
    continuation: Continuation,
}

struct Worker {
    inbox: Receiver<Command>,
    shared: Arc<Shared>,
    tree: Box<dyn UiTree>,
    sink: Arc<dyn NotificationSink>,
    rng: StdRng,
}

impl Worker {
    fn run(mut self) {
        let mut queue: DelayQueue<Scheduled> = DelayQueue::new();
        let mut machine: Option<CycleMachine> = None;

        loop {
            let command = match queue.next_deadline() {
                Some(deadline) => match self.inbox.recv_deadline(deadline) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                },
                None => match self.inbox.recv() {
                    Ok(command) => Some(command),
                    Err(_) => return,
                },
            };

            match command {
                Some(Command::Start { epoch, config }) => {
                    queue.clear();
                    machine = Some(CycleMachine::new(config));
                    queue.schedule_at(
                        Instant::now(),
                        Scheduled {
                            epoch,
                            continuation: Continuation::BeginCycle,
                        },
                    );
                }
                Some(Command::Stop) => {
                    queue.clear();
                    machine = None;
                }
                Some(Command::Shutdown) => return,
                None => {
                    let Some(job) = queue.pop_due(Instant::now()) else {
                        continue;
                    };
                    if let Some(machine) = machine.as_mut() {
                        self.fire(machine, job, &mut queue);
                    }
                }
            }
        }
    }

    fn fire(&mut self, machine: &mut CycleMachine, job: Scheduled, queue: &mut DelayQueue<Scheduled>) {
        if !self.shared.is_current(job.epoch) {
            debug!(step = job.continuation.label(), "dropping stale continuation");
            return;
        }

        let next = machine.run(
            job.continuation,
            self.tree.as_mut(),
            self.sink.as_ref(),
            &mut self.rng,
        );
        self.shared.publish_cycles(job.epoch, machine.cycles());

        if self.shared.is_current(job.epoch) {
            queue.schedule_after(
                Instant::now(),
                next.delay,
                Scheduled {
                    epoch: job.epoch,
                    continuation: next.continuation,
                },
            );
        }
    }
}
