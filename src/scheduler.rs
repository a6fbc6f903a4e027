use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};

/// Floor applied to every inter-cycle wait.
pub const MIN_INTERVAL_MS: u64 = 1000;
pub const JITTER_MIN: f64 = 0.7;
pub const JITTER_MAX: f64 = 1.3;
pub const DISTRACTION_PROBABILITY: f64 = 0.10;
/// Upper bound of the distraction term, as a share of the base interval.
pub const DISTRACTION_SHARE: f64 = 0.5;

/// The components of one randomized inter-cycle wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalDraw {
    pub base_ms: u64,
    /// `base_ms` scaled by a factor in `[JITTER_MIN, JITTER_MAX]`.
    pub jittered_ms: f64,
    /// Extra inattention time; zero most of the time.
    pub distraction_ms: f64,
}

impl IntervalDraw {
    pub fn total(&self) -> Duration {
        let ms = (self.jittered_ms + self.distraction_ms) as u64;
        Duration::from_millis(ms.max(MIN_INTERVAL_MS))
    }
}

pub fn draw_interval(base_ms: u64, rng: &mut impl Rng) -> IntervalDraw {
    let base = base_ms as f64;
    let factor = Uniform::new_inclusive(JITTER_MIN, JITTER_MAX).sample(rng);

    let distracted = Bernoulli::new(DISTRACTION_PROBABILITY)
        .map(|b| b.sample(rng))
        .unwrap_or(false);
    let distraction_ms = if distracted && base > 0.0 {
        rng.gen_range(0.0..DISTRACTION_SHARE * base)
    } else {
        0.0
    };

    IntervalDraw {
        base_ms,
        jittered_ms: base * factor,
        distraction_ms,
    }
}

/// Randomized wait before the next cycle.
pub fn next_delay(base_ms: u64, rng: &mut impl Rng) -> Duration {
    draw_interval(base_ms, rng).total()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DelaySummary {
    pub samples: usize,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub distracted: usize,
}

pub fn summarize(base_ms: u64, samples: usize, rng: &mut impl Rng) -> DelaySummary {
    let mut out = DelaySummary {
        samples,
        min_ms: u64::MAX,
        ..Default::default()
    };
    if samples == 0 {
        out.min_ms = 0;
        return out;
    }

    let mut total = 0u128;
    for _ in 0..samples {
        let draw = draw_interval(base_ms, rng);
        let ms = draw.total().as_millis() as u64;
        out.min_ms = out.min_ms.min(ms);
        out.max_ms = out.max_ms.max(ms);
        if draw.distraction_ms > 0.0 {
            out.distracted += 1;
        }
        total += ms as u128;
    }
    out.mean_ms = total as f64 / samples as f64;
    out
}

struct Entry<T> {
    due: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Timed continuations, released in due order (FIFO among equal deadlines).
pub struct DelayQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due: Instant, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, item }));
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, item: T) {
        self.schedule_at(now + delay, item);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    /// Remove and return the earliest item if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(e)| e.item)
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
