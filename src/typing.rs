use std::ops::Range;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::typo;

/// Pause between two ordinary keystrokes.
pub const KEYSTROKE_MS: Range<u64> = 80..200;
/// Extra pause occasionally inserted after a keystroke.
pub const THINKING_MS: Range<u64> = 200..500;
pub const THINKING_PROBABILITY: f64 = 0.05;
/// Time between typing a wrong glyph and deleting it.
pub const NOTICE_MS: Range<u64> = 200..600;
/// Time between deleting a wrong glyph and typing the right one.
pub const RETYPE_MS: Range<u64> = 80..200;

/// One unit of work for the driver: replace the surface text, then wait
/// `delay_ms` before asking for the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypingStep {
    SetText { text: String, delay_ms: u64 },
    Done,
}

impl TypingStep {
    pub fn delay(&self) -> Duration {
        match self {
            TypingStep::SetText { delay_ms, .. } => Duration::from_millis(*delay_ms),
            TypingStep::Done => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionStage {
    /// The wrong glyph is on screen and about to be deleted.
    Notice,
    /// The wrong glyph was deleted; the right one comes next.
    Retype,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCorrection {
    pub wrong: char,
    pub correct: char,
    pub stage: CorrectionStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingPhase {
    Idle,
    TypingChar,
    Correcting(CorrectionStage),
    Done,
}

/// Character-by-character typing of one message.
///
/// The session only decides what the surface should show next and how long to
/// wait; the caller applies the text and schedules the following [`step`].
///
/// [`step`]: TypingSession::step
#[derive(Debug, Clone)]
pub struct TypingSession {
    target: Vec<char>,
    cursor: usize,
    buffer: Vec<char>,
    pending: Option<PendingCorrection>,
    started: bool,
    done: bool,
    human_mode: bool,
    typo_rate: f64,
}

impl TypingSession {
    pub fn new(target: &str, human_mode: bool, typo_rate: f64) -> Self {
        Self {
            target: target.chars().collect(),
            cursor: 0,
            buffer: Vec::with_capacity(target.len()),
            pending: None,
            started: false,
            done: false,
            human_mode,
            typo_rate,
        }
    }

    pub fn phase(&self) -> TypingPhase {
        if self.done {
            TypingPhase::Done
        } else if let Some(pending) = self.pending {
            TypingPhase::Correcting(pending.stage)
        } else if self.started {
            TypingPhase::TypingChar
        } else {
            TypingPhase::Idle
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buffer(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn pending_correction(&self) -> Option<PendingCorrection> {
        self.pending
    }

    fn emit(&self, delay_ms: u64) -> TypingStep {
        TypingStep::SetText {
            text: self.buffer(),
            delay_ms,
        }
    }

    pub fn step(&mut self, rng: &mut impl Rng) -> TypingStep {
        if self.done {
            return TypingStep::Done;
        }
        self.started = true;

        if !self.human_mode {
            self.buffer = self.target.clone();
            self.cursor = self.target.len();
            self.done = true;
            return self.emit(0);
        }

        match self.pending {
            Some(PendingCorrection {
                stage: CorrectionStage::Notice,
                ..
            }) => {
                self.buffer.pop();
                if let Some(pending) = self.pending.as_mut() {
                    pending.stage = CorrectionStage::Retype;
                }
                self.emit(rng.gen_range(RETYPE_MS))
            }
            Some(PendingCorrection {
                correct,
                stage: CorrectionStage::Retype,
                ..
            }) => {
                self.buffer.push(correct);
                self.pending = None;
                self.cursor += 1;
                let delay = keystroke_delay(rng);
                self.emit(delay)
            }
            None => self.type_next(rng),
        }
    }

    fn type_next(&mut self, rng: &mut impl Rng) -> TypingStep {
        let Some(&c) = self.target.get(self.cursor) else {
            self.done = true;
            return TypingStep::Done;
        };

        let roll: f64 = rng.gen();
        if roll < self.typo_rate {
            if let Some(wrong) = typo::substitute(c, rng) {
                self.buffer.push(wrong);
                self.pending = Some(PendingCorrection {
                    wrong,
                    correct: c,
                    stage: CorrectionStage::Notice,
                });
                return self.emit(rng.gen_range(NOTICE_MS));
            }
        }

        self.buffer.push(c);
        self.cursor += 1;
        let delay = keystroke_delay(rng);
        self.emit(delay)
    }
}

/// Pause after an ordinary keystroke, occasionally stretched by a thinking
/// pause.
pub fn keystroke_delay(rng: &mut impl Rng) -> u64 {
    let mut ms = rng.gen_range(KEYSTROKE_MS);
    if rng.gen_bool(THINKING_PROBABILITY) {
        ms += rng.gen_range(THINKING_MS);
    }
    ms
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypingStats {
    pub mutations: usize,
    pub corrections: usize,
    pub total_delay_ms: u64,
}

/// Run a session to completion without a surface, returning every step before
/// `Done`.
pub fn simulate(
    target: &str,
    human_mode: bool,
    typo_rate: f64,
    rng: &mut impl Rng,
) -> Vec<TypingStep> {
    let mut session = TypingSession::new(target, human_mode, typo_rate);
    let mut steps = Vec::new();
    loop {
        match session.step(rng) {
            TypingStep::Done => return steps,
            step => steps.push(step),
        }
    }
}

pub fn stats(steps: &[TypingStep]) -> TypingStats {
    let mut out = TypingStats::default();
    let mut previous_len = 0usize;

    for step in steps {
        let TypingStep::SetText { text, delay_ms } = step else {
            continue;
        };
        let len = text.chars().count();
        out.mutations += 1;
        out.total_delay_ms = out.total_delay_ms.saturating_add(*delay_ms);
        if len < previous_len {
            out.corrections += 1;
        }
        previous_len = len;
    }

    out
}
