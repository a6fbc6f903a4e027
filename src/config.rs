use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::locator::LocatorProfile;
use crate::scheduler::MIN_INTERVAL_MS;

pub const DEFAULT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_TYPO_RATE: f64 = 0.03;

/// Candidate messages, one per non-blank line of the configured text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyPool {
    replies: Vec<String>,
}

impl ReplyPool {
    pub fn from_text(raw: &str) -> Self {
        Self {
            replies: raw
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.replies
    }

    /// Uniformly pick one reply. A single-entry pool does not touch `rng`.
    pub fn pick(&self, rng: &mut impl Rng) -> Option<&str> {
        match self.replies.as_slice() {
            [] => None,
            [only] => Some(only.as_str()),
            replies => Some(replies[rng.gen_range(0..replies.len())].as_str()),
        }
    }
}

/// Settings snapshot a run works from. Taken once per start.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub base_interval_ms: u64,
    pub human_mode_enabled: bool,
    pub typo_rate: f64,
    pub pool: ReplyPool,
    pub locator: LocatorProfile,
}

impl CycleConfig {
    pub fn load(store: &dyn SettingsStore) -> Self {
        let requested_interval = store.interval_ms();
        let base_interval_ms = requested_interval.max(MIN_INTERVAL_MS);
        if base_interval_ms != requested_interval {
            warn!(
                requested_ms = requested_interval,
                "interval below floor, using {MIN_INTERVAL_MS}ms"
            );
        }

        let requested_rate = store.typo_rate();
        let typo_rate = if requested_rate.is_nan() {
            DEFAULT_TYPO_RATE
        } else {
            requested_rate.clamp(0.0, 1.0)
        };
        if typo_rate != requested_rate {
            warn!(requested = requested_rate, used = typo_rate, "typo rate out of range");
        }

        Self {
            base_interval_ms,
            human_mode_enabled: store.human_mode_enabled(),
            typo_rate,
            pool: ReplyPool::from_text(&store.reply_text()),
            locator: store.locator_profile(),
        }
    }
}

/// Where the engine reads its configuration from at each start.
pub trait SettingsStore: Send + Sync {
    fn reply_text(&self) -> String;

    fn interval_ms(&self) -> u64;

    fn human_mode_enabled(&self) -> bool;

    fn typo_rate(&self) -> f64 {
        DEFAULT_TYPO_RATE
    }

    fn locator_profile(&self) -> LocatorProfile {
        LocatorProfile::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// One reply per line.
    pub reply_text: String,
    pub interval_ms: u64,
    pub human_mode: bool,
    pub typo_rate: f64,
    pub locator: LocatorProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reply_text: String::new(),
            interval_ms: DEFAULT_INTERVAL_MS,
            human_mode: true,
            typo_rate: DEFAULT_TYPO_RATE,
            locator: LocatorProfile::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("failed to parse settings JSON in {}", path.display()))
    }
}

impl SettingsStore for Settings {
    fn reply_text(&self) -> String {
        self.reply_text.clone()
    }

    fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn human_mode_enabled(&self) -> bool {
        self.human_mode
    }

    fn typo_rate(&self) -> f64 {
        self.typo_rate
    }

    fn locator_profile(&self) -> LocatorProfile {
        self.locator.clone()
    }
}

/// Settings that another part of the host may edit while the engine is
/// running. Edits take effect at the next start.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub fn update(&self, edit: impl FnOnce(&mut Settings)) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut guard);
    }

    pub fn get(&self) -> Settings {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SettingsStore for SharedSettings {
    fn reply_text(&self) -> String {
        self.get().reply_text
    }

    fn interval_ms(&self) -> u64 {
        self.get().interval_ms
    }

    fn human_mode_enabled(&self) -> bool {
        self.get().human_mode
    }

    fn typo_rate(&self) -> f64 {
        self.get().typo_rate
    }

    fn locator_profile(&self) -> LocatorProfile {
        self.get().locator
    }
}
