use std::fmt::{Display, Formatter, Result};

use task_core::TaskError;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    TaskError(TaskError),
    InvalidInput(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Error::TaskError(err) => write!(f, "Task error: {}", err),
            Error::InvalidInput(message) => write!(f, "Invalid input: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<TaskError> for Error {
    fn from(err: TaskError) -> Self {
        Error::TaskError(err)
    }
}
