use std::time::Duration;

use crate::error::TaskError;

/// Notifications sent from a running task to its owner.
///
/// All events for one run travel over the same channel, so every `Progress` event is received
/// before the single `Completed` event that closes the run.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T> {
    Progress { percent: u8 },
    Completed(TaskCompletion<T>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletion<T> {
    /// Cancellation was requested at some point during the run.
    pub cancelled: bool,
    /// Error raised by the worker body or by one of its auxiliary waits.
    pub error: Option<TaskError>,
    pub result: T,
    pub elapsed: Duration,
}

impl<T> TaskCompletion<T> {
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.error.is_none()
    }
}
