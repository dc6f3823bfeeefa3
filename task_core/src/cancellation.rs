use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::error::TaskError;

const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cooperative cancellation signal shared between whoever owns a task and its worker.
///
/// Clones observe the same flag. Cancellation is one-way: once set the flag stays set for the
/// rest of the run, so a worker that polls [`CancellationToken::is_cancelled`] between units of
/// work never sees it flip back.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        let transitioned = !self.cancelled.swap(true, Ordering::SeqCst);
        if transitioned {
            tracing::debug!("Cancellation requested");
        }
        transitioned
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels the token once `timeout` has elapsed.
    ///
    /// The timer runs on a small detached thread that exits early if the token gets cancelled
    /// by someone else first.
    pub fn cancel_after(&self, timeout: Duration) -> Result<(), TaskError> {
        let token = self.clone();
        let deadline = Instant::now() + timeout;
        thread::Builder::new()
            .name("cancel-timer".to_string())
            .spawn(move || {
                while !token.is_cancelled() {
                    let now = Instant::now();
                    if now >= deadline {
                        if token.cancel() {
                            tracing::info!(?timeout, "Cancellation timeout elapsed");
                        }
                        break;
                    }
                    thread::sleep(TIMEOUT_POLL_INTERVAL.min(deadline - now));
                }
            })
            .map(|_| ())
            .map_err(|e| TaskError::SpawnFailed(e.to_string()))
    }
}
