//! Single-use background tasks with cooperative cancellation.
//!
//! A [`TaskWorker`] runs on a dedicated thread owned by an [`AsyncTask`]. While it runs the
//! worker polls for cancellation, reports progress and may register auxiliary [`WaitHandle`]s
//! for sub-operations it launches. Once the worker returns and every wait has been joined, one
//! [`TaskEvent::Completed`] is sent carrying the cancellation flag, any captured error and the
//! worker's output.
//!
//! ```ignore
//! let (tx, rx) = flume::unbounded();
//! let mut task = AsyncTask::new(worker);
//! task.start(Some(tx))?;
//!
//! while let Ok(event) = rx.recv() {
//!     match event {
//!         TaskEvent::Progress { percent } => println!("{}%", percent),
//!         TaskEvent::Completed(completion) => {
//!             println!("cancelled: {}", completion.cancelled);
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod cancellation;
pub mod engine;
pub mod error;
pub mod events;
pub mod task;
pub mod wait_handle;

pub use cancellation::CancellationToken;
pub use engine::{TaskContext, TaskCore, TaskObserver, TaskState};
pub use error::TaskError;
pub use events::{TaskCompletion, TaskEvent};
pub use task::{AsyncTask, TaskWorker};
pub use wait_handle::{Signal, SignalWait, WaitHandle, signal};
