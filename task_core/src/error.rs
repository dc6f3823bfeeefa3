use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task has already been started")]
    AlreadyStarted,
    #[error("Task has not been started")]
    NotStarted,
    #[error("Task cannot be awaited from its own worker thread")]
    AwaitFromWorker,
    #[error("Task has already finished")]
    AlreadyFinished,
    #[error("Invalid progress: {done} of {total}")]
    InvalidProgress { done: u64, total: u64 },
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("Auxiliary wait failed: {0}")]
    WaitFailed(String),
    #[error("Failed to spawn worker thread: {0}")]
    SpawnFailed(String),
}
