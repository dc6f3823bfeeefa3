use std::sync::{Arc, Mutex, PoisonError};

use flume::Sender;

use crate::{
    cancellation::CancellationToken,
    engine::{TaskContext, TaskCore, TaskObserver, TaskState},
    error::TaskError,
    events::{TaskCompletion, TaskEvent},
    wait_handle::WaitHandle,
};

/// Long-running routine executed by an [`AsyncTask`] off the caller's thread.
///
/// # Example
///
/// ```ignore
/// struct Countdown(usize);
///
/// impl TaskWorker for Countdown {
///     type Output = usize;
///
///     fn name(&self) -> &'static str {
///         "countdown"
///     }
///
///     fn run(&mut self, context: &TaskContext<'_>, output: &mut usize) -> Result<(), TaskError> {
///         for done in 1..=self.0 {
///             if context.is_cancelled() {
///                 return Ok(());
///             }
///             *output = done;
///             context.report_progress(done, self.0)?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait TaskWorker: Send + 'static {
    type Output: Default + Clone + Send + 'static;

    /// Used as the worker thread name and in logs.
    fn name(&self) -> &'static str;

    /// Fills `output`, which starts out as `Output::default()` on every run. The worker should
    /// poll [`TaskContext::is_cancelled`] between units of work and return early once it is set.
    fn run(&mut self, context: &TaskContext<'_>, output: &mut Self::Output)
    -> Result<(), TaskError>;
}

type CompletionSlot<T> = Arc<Mutex<Option<TaskCompletion<T>>>>;

struct CompletionRelay<T> {
    events: Option<Sender<TaskEvent<T>>>,
    slot: CompletionSlot<T>,
}

impl<T: Clone + Send + 'static> TaskObserver<T> for CompletionRelay<T> {
    fn progress(&self, percent: u8) {
        self.events.progress(percent);
    }

    fn completed(&self, completion: TaskCompletion<T>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(completion.clone());
        self.events.completed(completion);
    }
}

/// A [`TaskCore`] bound to a worker with a typed output.
pub struct AsyncTask<W: TaskWorker> {
    core: TaskCore,
    worker: Option<W>,
    slot: CompletionSlot<W::Output>,
    completion: Option<TaskCompletion<W::Output>>,
}

impl<W: TaskWorker> AsyncTask<W> {
    pub fn new(worker: W) -> Self {
        Self::with_token(worker, CancellationToken::new())
    }

    /// Creates a task that shares `token` with other cancellation sources.
    pub fn with_token(worker: W, token: CancellationToken) -> Self {
        Self {
            core: TaskCore::with_token(worker.name(), token),
            worker: Some(worker),
            slot: Arc::new(Mutex::new(None)),
            completion: None,
        }
    }

    /// Starts the worker and returns immediately. Progress and completion are sent to `events`
    /// if given; the completion can also be collected with [`AsyncTask::wait_for_result`].
    pub fn start(&mut self, events: Option<Sender<TaskEvent<W::Output>>>) -> Result<(), TaskError> {
        let mut worker = self.worker.take().ok_or(TaskError::AlreadyStarted)?;
        let relay = CompletionRelay {
            events,
            slot: Arc::clone(&self.slot),
        };
        self.core
            .start(move |context, output| worker.run(context, output), relay)
    }

    pub fn cancel(&self) {
        self.core.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.core.cancellation_token()
    }

    pub fn state(&self) -> TaskState {
        self.core.state()
    }

    pub fn enqueue_wait(&self, handle: impl WaitHandle + 'static) -> Result<(), TaskError> {
        self.core.enqueue_wait(handle)
    }

    /// Blocks until the run has fully completed. Must not be called from the worker itself.
    pub fn await_completion(&mut self) -> Result<(), TaskError> {
        self.core.await_completion()?;
        if self.completion.is_none() {
            self.completion = self
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        Ok(())
    }

    /// Blocks until the run has fully completed and returns its result.
    pub fn wait_for_result(&mut self) -> Result<&W::Output, TaskError> {
        self.wait_for_completion().map(|completion| &completion.result)
    }

    pub fn wait_for_completion(&mut self) -> Result<&TaskCompletion<W::Output>, TaskError> {
        self.await_completion()?;
        self.completion.as_ref().ok_or(TaskError::NotStarted)
    }

    pub fn into_completion(mut self) -> Result<TaskCompletion<W::Output>, TaskError> {
        self.await_completion()?;
        self.completion.take().ok_or(TaskError::NotStarted)
    }

    /// Completion of a run that has already been awaited.
    pub fn completion(&self) -> Option<&TaskCompletion<W::Output>> {
        self.completion.as_ref()
    }
}
