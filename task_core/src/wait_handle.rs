use std::thread::JoinHandle;

use crate::{engine::panic_message, error::TaskError};

/// A sub-operation launched by a worker that has to finish before its task may complete.
///
/// Handles are consumed by [`WaitHandle::wait`], so each one is joined exactly once.
pub trait WaitHandle: Send {
    /// Name used when logging the join.
    fn name(&self) -> String {
        "auxiliary wait".to_string()
    }

    /// Blocks until the sub-operation has signaled.
    fn wait(self: Box<Self>) -> Result<(), TaskError>;
}

impl<T: Send + 'static> WaitHandle for JoinHandle<T> {
    fn name(&self) -> String {
        self.thread().name().unwrap_or("unnamed thread").to_string()
    }

    fn wait(self: Box<Self>) -> Result<(), TaskError> {
        let name = self.thread().name().unwrap_or("unnamed thread").to_string();
        (*self).join().map(|_| ()).map_err(|payload| {
            TaskError::WaitFailed(format!(
                "{} panicked: {}",
                name,
                panic_message(payload.as_ref())
            ))
        })
    }
}

/// Creates a one-shot signal. The [`Signal`] goes to whoever does the work, the
/// [`SignalWait`] is enqueued on the task.
pub fn signal(name: impl Into<String>) -> (Signal, SignalWait) {
    let (tx, rx) = flume::bounded(1);
    (
        Signal { tx },
        SignalWait {
            name: name.into(),
            rx,
        },
    )
}

#[derive(Debug)]
pub struct Signal {
    tx: flume::Sender<()>,
}

impl Signal {
    pub fn notify(self) {
        // The waiting side may already be gone if the task was dropped.
        let _ = self.tx.send(());
    }
}

#[derive(Debug)]
pub struct SignalWait {
    name: String,
    rx: flume::Receiver<()>,
}

impl WaitHandle for SignalWait {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn wait(self: Box<Self>) -> Result<(), TaskError> {
        self.rx.recv().map_err(|_| {
            TaskError::WaitFailed(format!("{} was dropped without being notified", self.name))
        })
    }
}
