use thiserror::Error;

/// Why a run could not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("no reply content configured")]
    NotConfigured,
    #[error("engine worker is no longer running")]
    WorkerGone,
}

/// Why a cycle ended early. None of these stop the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("no foreground UI tree available")]
    TreeUnavailable,
    #[error("reply pool resolved empty")]
    EmptyPool,
    #[error("input surface not found")]
    InputSurfaceNotFound,
    #[error("cycle step panicked: {0}")]
    StepPanicked(String),
}
