use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle, ThreadId},
    time::Instant,
};

use crate::{
    cancellation::CancellationToken,
    error::TaskError,
    events::{TaskCompletion, TaskEvent},
    wait_handle::WaitHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Cancelling,
    Completed,
    Faulted,
}

/// Receives the notifications of a single run. Called from the worker thread.
pub trait TaskObserver<T>: Send + 'static {
    fn progress(&self, percent: u8);

    /// Called exactly once, after the worker body has returned and every auxiliary wait has
    /// been joined.
    fn completed(&self, completion: TaskCompletion<T>);
}

impl<T: Send + 'static> TaskObserver<T> for Option<flume::Sender<TaskEvent<T>>> {
    fn progress(&self, percent: u8) {
        if let Some(tx) = self
            && tx.send(TaskEvent::Progress { percent }).is_err()
        {
            tracing::trace!("Progress receiver dropped");
        }
    }

    fn completed(&self, completion: TaskCompletion<T>) {
        if let Some(tx) = self
            && tx.send(TaskEvent::Completed(completion)).is_err()
        {
            tracing::debug!("Completion receiver dropped before the task finished");
        }
    }
}

struct CoreInner {
    state: TaskState,
    waits: VecDeque<Box<dyn WaitHandle>>,
    // Set once the drain has found the queue empty, or the worker never started.
    waits_closed: bool,
}

struct Shared {
    inner: Mutex<CoreInner>,
    token: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue_wait(&self, handle: Box<dyn WaitHandle>) -> Result<(), TaskError> {
        let mut inner = self.lock();
        if inner.waits_closed {
            tracing::warn!(wait = %handle.name(), "Wait enqueued after the task finished");
            return Err(TaskError::AlreadyFinished);
        }
        tracing::trace!(wait = %handle.name(), "Auxiliary wait enqueued");
        inner.waits.push_back(handle);
        Ok(())
    }

    /// Joins queued waits in FIFO order until the queue stays empty. Waits enqueued while
    /// draining are joined too. Returns the first failure, but always drains everything.
    fn await_workers_join(&self) -> Result<(), TaskError> {
        let mut first_error = None;
        loop {
            let next = {
                let mut inner = self.lock();
                let next = inner.waits.pop_front();
                inner.waits_closed = next.is_none();
                next
            };
            let Some(handle) = next else {
                break;
            };
            let name = handle.name();
            tracing::trace!(wait = %name, "Joining auxiliary wait");
            if let Err(e) = handle.wait() {
                tracing::warn!(wait = %name, error = %e, "Auxiliary wait failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Handle given to a worker body while it runs.
pub struct TaskContext<'a> {
    shared: &'a Shared,
    progress: &'a dyn Fn(u8),
}

impl TaskContext<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.shared.token
    }

    pub fn enqueue_wait(&self, handle: impl WaitHandle + 'static) -> Result<(), TaskError> {
        self.shared.enqueue_wait(Box::new(handle))
    }

    /// Reports `done` out of `total` units as a truncated percentage.
    pub fn report_progress(&self, done: usize, total: usize) -> Result<(), TaskError> {
        let (done, total) = (done as u64, total as u64);
        if total == 0 || done > total {
            return Err(TaskError::InvalidProgress { done, total });
        }
        // done <= total keeps this within 0..=100
        let percent = (u128::from(done) * 100) / u128::from(total);
        self.report_percent(percent as u8)
    }

    pub fn report_percent(&self, percent: u8) -> Result<(), TaskError> {
        if percent > 100 {
            return Err(TaskError::InvalidProgress {
                done: percent as u64,
                total: 100,
            });
        }
        (self.progress)(percent);
        Ok(())
    }
}

/// Single-use engine that runs a worker body on its own thread.
///
/// Lifecycle: `Created -> Running -> (Cancelling) -> Completed | Faulted`. The completion
/// notification is raised from the worker thread once the body has returned (normally, with an
/// error or by panicking) and every auxiliary wait has been joined.
pub struct TaskCore {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    worker_thread: Option<ThreadId>,
    spawn_error: Option<TaskError>,
}

impl TaskCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_token(name, CancellationToken::new())
    }

    pub fn with_token(name: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                inner: Mutex::new(CoreInner {
                    state: TaskState::Created,
                    waits: VecDeque::new(),
                    waits_closed: false,
                }),
                token,
            }),
            handle: None,
            worker_thread: None,
            spawn_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        let state = self.shared.lock().state;
        if state == TaskState::Running && self.shared.token.is_cancelled() {
            TaskState::Cancelling
        } else {
            state
        }
    }

    /// Requests cooperative cancellation. Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        if self.shared.token.cancel() {
            tracing::info!(task = %self.name, "Task cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    /// Registers a wait to be joined before completion. Fails with
    /// [`TaskError::AlreadyFinished`] once the run can no longer join it.
    pub fn enqueue_wait(&self, handle: impl WaitHandle + 'static) -> Result<(), TaskError> {
        self.shared.enqueue_wait(Box::new(handle))
    }

    /// Spawns the worker thread and returns immediately.
    ///
    /// `body` gets a freshly defaulted output to fill in. Whatever it leaves there is handed to
    /// `observer` together with the cancellation flag and any error.
    pub fn start<T, B, O>(&mut self, body: B, observer: O) -> Result<(), TaskError>
    where
        T: Default + Send + 'static,
        B: FnOnce(&TaskContext<'_>, &mut T) -> Result<(), TaskError> + Send + 'static,
        O: TaskObserver<T>,
    {
        {
            let mut inner = self.shared.lock();
            if inner.state != TaskState::Created {
                return Err(TaskError::AlreadyStarted);
            }
            inner.state = TaskState::Running;
        }

        let shared = Arc::clone(&self.shared);
        let task_name = self.name.clone();
        let spawn_res = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_worker(&task_name, &shared, body, observer));

        match spawn_res {
            Ok(handle) => {
                tracing::debug!(task = %self.name, "Task started");
                self.worker_thread = Some(handle.thread().id());
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                tracing::error!(task = %self.name, error = %e, "Failed to spawn worker thread");
                let error = TaskError::SpawnFailed(e.to_string());
                {
                    let mut inner = self.shared.lock();
                    inner.state = TaskState::Faulted;
                    inner.waits_closed = true;
                }
                self.spawn_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Blocks until the worker and all auxiliary waits are done and the completion notification
    /// has been raised. Returns immediately if that already happened.
    pub fn await_completion(&mut self) -> Result<(), TaskError> {
        if self.worker_thread == Some(thread::current().id()) {
            return Err(TaskError::AwaitFromWorker);
        }
        if let Some(error) = &self.spawn_error {
            return Err(error.clone());
        }
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|payload| TaskError::WorkerPanicked(panic_message(payload.as_ref()))),
            None if self.shared.lock().state == TaskState::Created => Err(TaskError::NotStarted),
            None => Ok(()),
        }
    }
}

fn run_worker<T, B, O>(task_name: &str, shared: &Shared, body: B, observer: O)
where
    T: Default,
    B: FnOnce(&TaskContext<'_>, &mut T) -> Result<(), TaskError>,
    O: TaskObserver<T>,
{
    let started = Instant::now();
    let mut output = T::default();
    let report = |percent: u8| observer.progress(percent);
    let context = TaskContext {
        shared,
        progress: &report,
    };

    let mut error = match panic::catch_unwind(AssertUnwindSafe(|| body(&context, &mut output))) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(payload) => Some(TaskError::WorkerPanicked(panic_message(payload.as_ref()))),
    };
    if let Some(e) = &error {
        tracing::error!(task = %task_name, error = %e, "Worker failed");
    }

    if let Err(e) = shared.await_workers_join() {
        error.get_or_insert(e);
    }

    let cancelled = shared.token.is_cancelled();
    let elapsed = started.elapsed();
    shared.lock().state = if error.is_some() {
        TaskState::Faulted
    } else {
        TaskState::Completed
    };
    tracing::info!(
        task = %task_name,
        cancelled,
        failed = error.is_some(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Task finished"
    );

    observer.completed(TaskCompletion {
        cancelled,
        error,
        result: output,
        elapsed,
    });
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::wait_handle::signal;

    type Events = flume::Receiver<TaskEvent<Vec<u32>>>;

    fn start_core<B>(core: &mut TaskCore, body: B) -> Events
    where
        B: FnOnce(&TaskContext<'_>, &mut Vec<u32>) -> Result<(), TaskError> + Send + 'static,
    {
        let (tx, rx) = flume::unbounded();
        core.start(body, Some(tx)).unwrap();
        rx
    }

    fn completion(events: &Events) -> TaskCompletion<Vec<u32>> {
        loop {
            match events.recv_timeout(Duration::from_secs(5)).unwrap() {
                TaskEvent::Progress { .. } => continue,
                TaskEvent::Completed(completion) => return completion,
            }
        }
    }

    struct RecordingWait {
        id: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl WaitHandle for RecordingWait {
        fn wait(self: Box<Self>) -> Result<(), TaskError> {
            self.log.lock().unwrap().push(self.id);
            Ok(())
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let mut core = TaskCore::new("twice");
        let _events = start_core(&mut core, |_, _| Ok(()));
        let res = core.start(
            |_, _: &mut Vec<u32>| Ok(()),
            None::<flume::Sender<TaskEvent<Vec<u32>>>>,
        );
        assert_eq!(res, Err(TaskError::AlreadyStarted));
        core.await_completion().unwrap();
    }

    #[test]
    fn test_await_before_start_fails() {
        let mut core = TaskCore::new("idle");
        assert_eq!(core.await_completion(), Err(TaskError::NotStarted));
        assert_eq!(core.state(), TaskState::Created);
    }

    #[test]
    fn test_completes_with_output() {
        let mut core = TaskCore::new("output");
        let events = start_core(&mut core, |ctx, out| {
            out.push(7);
            ctx.report_progress(1, 1)
        });
        core.await_completion().unwrap();
        // Second await returns straight away.
        core.await_completion().unwrap();

        assert_eq!(events.recv().unwrap(), TaskEvent::Progress { percent: 100 });
        let completion = completion(&events);
        assert!(completion.is_success());
        assert_eq!(completion.result, vec![7]);
        assert_eq!(core.state(), TaskState::Completed);
    }

    #[test]
    fn test_worker_error_is_captured() {
        let mut core = TaskCore::new("failing");
        let events = start_core(&mut core, |_, out| {
            out.push(1);
            Err(TaskError::WorkerFailed("disk on fire".to_string()))
        });
        core.await_completion().unwrap();

        let completion = completion(&events);
        assert_eq!(
            completion.error,
            Some(TaskError::WorkerFailed("disk on fire".to_string()))
        );
        assert_eq!(completion.result, vec![1]);
        assert!(!completion.cancelled);
        assert_eq!(core.state(), TaskState::Faulted);
    }

    #[test]
    fn test_worker_panic_is_captured_and_waits_drained() {
        let mut core = TaskCore::new("panicking");
        let log = Arc::new(Mutex::new(Vec::new()));
        let worker_log = Arc::clone(&log);
        let events = start_core(&mut core, move |ctx, _| {
            ctx.enqueue_wait(RecordingWait {
                id: 1,
                log: worker_log,
            })?;
            panic!("worker blew up");
        });
        core.await_completion().unwrap();

        let completion = completion(&events);
        assert_eq!(
            completion.error,
            Some(TaskError::WorkerPanicked("worker blew up".to_string()))
        );
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_waits_joined_in_fifo_order_before_completion() {
        let mut core = TaskCore::new("fan-out");
        let log = Arc::new(Mutex::new(Vec::new()));
        let worker_log = Arc::clone(&log);
        let events = start_core(&mut core, move |ctx, _| {
            for id in 0..3 {
                ctx.enqueue_wait(RecordingWait {
                    id,
                    log: Arc::clone(&worker_log),
                })?;
            }
            Ok(())
        });

        let completion = completion(&events);
        assert!(completion.is_success());
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        core.await_completion().unwrap();
    }

    #[test]
    fn test_completion_waits_for_slow_sub_operation() {
        let mut core = TaskCore::new("slow-helper");
        let finished = Arc::new(AtomicBool::new(false));
        let helper_finished = Arc::clone(&finished);
        let events = start_core(&mut core, move |ctx, _| {
            let (signal, wait) = signal("slow helper");
            ctx.enqueue_wait(wait)?;
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                helper_finished.store(true, Ordering::SeqCst);
                signal.notify();
            });
            Ok(())
        });

        let completion = completion(&events);
        assert!(completion.is_success());
        assert!(finished.load(Ordering::SeqCst));
        core.await_completion().unwrap();
    }

    #[test]
    fn test_failed_wait_surfaces_as_error() {
        let mut core = TaskCore::new("dropped-signal");
        let events = start_core(&mut core, |ctx, _| {
            let (signal, wait) = signal("abandoned");
            ctx.enqueue_wait(wait)?;
            drop(signal);
            Ok(())
        });
        core.await_completion().unwrap();

        let completion = completion(&events);
        assert!(matches!(completion.error, Some(TaskError::WaitFailed(_))));
        assert_eq!(core.state(), TaskState::Faulted);
    }

    #[test]
    fn test_host_enqueued_wait_is_joined() {
        let mut core = TaskCore::new("host-wait");
        let log = Arc::new(Mutex::new(Vec::new()));
        core.enqueue_wait(RecordingWait {
            id: 9,
            log: Arc::clone(&log),
        })
        .unwrap();
        let events = start_core(&mut core, |_, _| Ok(()));
        completion(&events);
        assert_eq!(*log.lock().unwrap(), vec![9]);
        core.await_completion().unwrap();
    }

    #[test]
    fn test_wait_enqueued_after_completion_is_rejected() {
        let mut core = TaskCore::new("late-wait");
        let events = start_core(&mut core, |_, _| Ok(()));
        core.await_completion().unwrap();
        assert!(completion(&events).is_success());

        let log = Arc::new(Mutex::new(Vec::new()));
        let res = core.enqueue_wait(RecordingWait {
            id: 3,
            log: Arc::clone(&log),
        });
        assert_eq!(res, Err(TaskError::AlreadyFinished));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_progress_near_usize_max_does_not_overflow() {
        let mut core = TaskCore::new("huge-progress");
        let events = start_core(&mut core, |ctx, _| {
            ctx.report_progress(usize::MAX - 1, usize::MAX)?;
            ctx.report_progress(usize::MAX, usize::MAX)
        });
        core.await_completion().unwrap();

        assert_eq!(events.recv().unwrap(), TaskEvent::Progress { percent: 99 });
        assert_eq!(events.recv().unwrap(), TaskEvent::Progress { percent: 100 });
        assert!(completion(&events).is_success());
    }

    #[test]
    fn test_zero_total_progress_faults_task() {
        let mut core = TaskCore::new("bad-progress");
        let events = start_core(&mut core, |ctx, _| ctx.report_progress(0, 0));
        core.await_completion().unwrap();

        let completion = completion(&events);
        assert_eq!(
            completion.error,
            Some(TaskError::InvalidProgress { done: 0, total: 0 })
        );
    }

    #[test]
    fn test_percent_above_hundred_rejected() {
        let mut core = TaskCore::new("bad-percent");
        let events = start_core(&mut core, |ctx, _| {
            ctx.report_percent(40)?;
            ctx.report_percent(101)
        });
        core.await_completion().unwrap();

        assert_eq!(events.recv().unwrap(), TaskEvent::Progress { percent: 40 });
        let completion = completion(&events);
        assert!(matches!(
            completion.error,
            Some(TaskError::InvalidProgress { .. })
        ));
    }

    #[test]
    fn test_progress_truncates() {
        let mut core = TaskCore::new("thirds");
        let events = start_core(&mut core, |ctx, _| {
            for done in 1..=3 {
                ctx.report_progress(done, 3)?;
            }
            Ok(())
        });
        core.await_completion().unwrap();

        let percents: Vec<u8> = events
            .drain()
            .filter_map(|event| match event {
                TaskEvent::Progress { percent } => Some(percent),
                TaskEvent::Completed(_) => None,
            })
            .collect();
        assert_eq!(percents, vec![33, 66, 100]);
    }

    #[test]
    fn test_cancel_observed_by_worker() {
        let mut core = TaskCore::new("cancellable");
        let (go_tx, go_rx) = flume::bounded::<()>(0);
        let events = start_core(&mut core, move |ctx, out| {
            go_rx.recv().ok();
            if ctx.is_cancelled() {
                return Ok(());
            }
            out.push(1);
            Ok(())
        });

        core.cancel();
        core.cancel();
        assert_eq!(core.state(), TaskState::Cancelling);
        go_tx.send(()).unwrap();
        core.await_completion().unwrap();

        let completion = completion(&events);
        assert!(completion.cancelled);
        assert!(completion.error.is_none());
        assert!(completion.result.is_empty());
        assert_eq!(core.state(), TaskState::Completed);
    }

    #[test]
    fn test_shared_token_cancels_before_start() {
        let token = CancellationToken::new();
        let mut core = TaskCore::with_token("pre-cancelled", token.clone());
        token.cancel();
        let events = start_core(&mut core, |ctx, out| {
            if !ctx.is_cancelled() {
                out.push(1);
            }
            Ok(())
        });
        core.await_completion().unwrap();

        let completion = completion(&events);
        assert!(completion.cancelled);
        assert!(completion.result.is_empty());
    }
}
