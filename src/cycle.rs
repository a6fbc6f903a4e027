use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::CycleConfig;
use crate::controller::NotificationSink;
use crate::error::CycleError;
use crate::locator::{find_input_surface, find_submit_control, find_typing_target};
use crate::scheduler::next_delay;
use crate::tree::{Surface, UiTree};
use crate::typing::{TypingSession, TypingStep};

/// Wait after tapping the input surface before typing into it.
pub const FOCUS_SETTLE_MS: Range<u64> = 200..400;
/// Wait after the last keystroke before pressing submit.
pub const REVIEW_MS: Range<u64> = 300..700;

/// What the worker should do when the next timer fires.
#[derive(Debug, Clone)]
pub enum Continuation {
    BeginCycle,
    StartTyping { message: String, tapped: Surface },
    Type { session: TypingSession, surface: Surface },
    Submit,
}

impl Continuation {
    pub fn label(&self) -> &'static str {
        match self {
            Continuation::BeginCycle => "begin_cycle",
            Continuation::StartTyping { .. } => "start_typing",
            Continuation::Type { .. } => "type",
            Continuation::Submit => "submit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Next {
    pub delay: Duration,
    pub continuation: Continuation,
}

/// Executes one continuation at a time and always hands back the next one.
///
/// Every path through a cycle ends in a rescheduled `BeginCycle`; failures
/// only shorten the cycle.
#[derive(Debug)]
pub struct CycleMachine {
    config: CycleConfig,
    cycles: u64,
}

impl CycleMachine {
    pub fn new(config: CycleConfig) -> Self {
        Self { config, cycles: 0 }
    }

    /// Number of cycles begun since this run started.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn run(
        &mut self,
        continuation: Continuation,
        tree: &mut dyn UiTree,
        sink: &dyn NotificationSink,
        rng: &mut impl Rng,
    ) -> Next {
        let label = continuation.label();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_run(continuation, tree, sink, rng)
        }))
        .unwrap_or_else(|payload| Err(CycleError::StepPanicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(next) => next,
            Err(err) => {
                warn!(cycle = self.cycles, step = label, "cycle aborted: {err}");
                self.reschedule(rng)
            }
        }
    }

    fn try_run(
        &mut self,
        continuation: Continuation,
        tree: &mut dyn UiTree,
        sink: &dyn NotificationSink,
        rng: &mut impl Rng,
    ) -> Result<Next, CycleError> {
        match continuation {
            Continuation::BeginCycle => self.begin_cycle(tree, sink, rng),
            Continuation::StartTyping { message, tapped } => {
                let surface = match tree.current_root() {
                    Some(root) => find_typing_target(&root, &self.config.locator, &tapped),
                    None => tapped,
                };
                debug!(cycle = self.cycles, surface = %surface, "typing into surface");
                let session = TypingSession::new(
                    &message,
                    self.config.human_mode_enabled,
                    self.config.typo_rate,
                );
                Ok(self.type_step(session, surface, tree, rng))
            }
            Continuation::Type { session, surface } => {
                Ok(self.type_step(session, surface, tree, rng))
            }
            Continuation::Submit => self.submit(tree, rng),
        }
    }

    fn begin_cycle(
        &mut self,
        tree: &mut dyn UiTree,
        sink: &dyn NotificationSink,
        rng: &mut impl Rng,
    ) -> Result<Next, CycleError> {
        self.cycles += 1;
        info!(cycle = self.cycles, "starting cycle");
        sink.update(&format!("auto reply running, cycle #{}", self.cycles));

        let root = tree.current_root().ok_or(CycleError::TreeUnavailable)?;
        let message = self
            .config
            .pool
            .pick(rng)
            .ok_or(CycleError::EmptyPool)?
            .to_string();
        debug!(cycle = self.cycles, message = %message, "selected reply");

        let tapped = find_input_surface(&root, &self.config.locator)
            .ok_or(CycleError::InputSurfaceNotFound)?;
        if tree.click(&tapped) {
            debug!(surface = %tapped, "tapped input surface");
        } else {
            warn!(surface = %tapped, "tap on input surface failed");
        }

        Ok(Next {
            delay: Duration::from_millis(rng.gen_range(FOCUS_SETTLE_MS)),
            continuation: Continuation::StartTyping { message, tapped },
        })
    }

    fn type_step(
        &mut self,
        mut session: TypingSession,
        surface: Surface,
        tree: &mut dyn UiTree,
        rng: &mut impl Rng,
    ) -> Next {
        match session.step(rng) {
            TypingStep::SetText { text, delay_ms } => {
                if !tree.set_text(&surface, &text) {
                    warn!(surface = %surface, "set_text failed, continuing");
                }
                Next {
                    delay: Duration::from_millis(delay_ms),
                    continuation: Continuation::Type { session, surface },
                }
            }
            TypingStep::Done => {
                debug!(cycle = self.cycles, text = %session.buffer(), "typing complete");
                Next {
                    delay: Duration::from_millis(rng.gen_range(REVIEW_MS)),
                    continuation: Continuation::Submit,
                }
            }
        }
    }

    fn submit(&mut self, tree: &mut dyn UiTree, rng: &mut impl Rng) -> Result<Next, CycleError> {
        let root = tree.current_root().ok_or(CycleError::TreeUnavailable)?;
        match find_submit_control(&root, &self.config.locator) {
            Some(control) => {
                if tree.click(&control) {
                    info!(cycle = self.cycles, control = %control, "submitted reply");
                } else {
                    warn!(cycle = self.cycles, control = %control, "submit click failed");
                }
            }
            None => info!(cycle = self.cycles, "submit control not found"),
        }
        Ok(self.reschedule(rng))
    }

    fn reschedule(&mut self, rng: &mut impl Rng) -> Next {
        let delay = next_delay(self.config.base_interval_ms, rng);
        debug!(
            cycle = self.cycles,
            delay_ms = delay.as_millis() as u64,
            "next cycle armed"
        );
        Next {
            delay,
            continuation: Continuation::BeginCycle,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
