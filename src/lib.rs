pub mod config;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod host;
pub mod locator;
pub mod scheduler;
pub mod tree;
pub mod typing;
pub mod typo;

pub use config::{CycleConfig, ReplyPool, Settings, SettingsStore, SharedSettings};
pub use controller::{Controller, EngineOptions, LogSink, NotificationSink, RunState};
pub use error::{CycleError, StartError};
pub use tree::{NodeSpec, Surface, SurfaceId, UiSnapshot, UiTree};
