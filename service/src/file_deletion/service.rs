use std::{path::PathBuf, sync::Arc};

use core_types::DeletionSummary;
use flume::Sender;
use task_core::{AsyncTask, CancellationToken, TaskEvent};

use crate::{
    error::Error,
    file_deletion::{model::DeletionReport, task::FileDeletionTask},
    file_system_ops::{FileSystemOps, StdFileSystemOps},
    settings::DeletionSettings,
};

pub type DeletionEvent = TaskEvent<DeletionReport>;

pub struct FileDeletionService {
    settings: Arc<DeletionSettings>,
    fs_ops: Arc<dyn FileSystemOps>,
}

impl FileDeletionService {
    pub fn new(settings: Arc<DeletionSettings>) -> Self {
        Self::new_with_fs_ops(settings, Arc::new(StdFileSystemOps))
    }

    pub fn new_with_fs_ops(
        settings: Arc<DeletionSettings>,
        fs_ops: Arc<dyn FileSystemOps>,
    ) -> Self {
        Self { settings, fs_ops }
    }

    /// Starts deleting `files` in the background and hands the running task back to the caller,
    /// who can cancel it or block on its result.
    #[tracing::instrument(skip_all, fields(file_count = files.len()), err)]
    pub fn start_deletion(
        &self,
        files: Vec<PathBuf>,
        progress_tx: Option<Sender<DeletionEvent>>,
        cancel_token: CancellationToken,
    ) -> Result<AsyncTask<FileDeletionTask>, Error> {
        let worker = FileDeletionTask::new(files, self.fs_ops.clone(), self.settings.clone());
        let mut task = AsyncTask::with_token(worker, cancel_token);
        task.start(progress_tx)?;
        Ok(task)
    }

    /// Deletes `files` and resolves once the run has completed. Events are forwarded to
    /// `progress_tx` as they arrive.
    ///
    /// A run that is cancelled or stops on a fault still yields a summary: `cancelled` or
    /// `error` is set and the files recorded as left up to that point are kept. `Err` is only
    /// returned when the run could not be started or awaited.
    #[tracing::instrument(skip_all, fields(file_count = files.len()), err)]
    pub async fn delete_files(
        &self,
        files: Vec<PathBuf>,
        progress_tx: Option<Sender<DeletionEvent>>,
        cancel_token: CancellationToken,
    ) -> Result<DeletionSummary, Error> {
        let total_files = files.len();
        let (tx, rx) = flume::unbounded::<DeletionEvent>();
        let task = self.start_deletion(files, Some(tx), cancel_token)?;

        let mut completion = None;
        while let Ok(event) = rx.recv_async().await {
            if let Some(progress_tx) = &progress_tx
                && progress_tx.send_async(event.clone()).await.is_err()
            {
                tracing::debug!("Progress receiver dropped, continuing without forwarding");
            }
            if let TaskEvent::Completed(c) = event {
                completion = Some(c);
                break;
            }
        }

        let completion = match completion {
            Some(completion) => completion,
            // Channel closed without a completion event, the join tells us why.
            None => task.into_completion()?,
        };

        if let Some(error) = &completion.error {
            tracing::error!(
                error = %error,
                left = completion.result.files_left.len(),
                "File deletion stopped on a fault"
            );
        }

        let summary = completion.result.into_summary(
            total_files,
            completion.cancelled,
            completion.error.as_ref(),
            completion.elapsed,
        );
        tracing::info!(
            total_files = summary.total_files,
            deleted = summary.deleted,
            left = summary.files_left.len(),
            cancelled = summary.cancelled,
            "File deletion summary"
        );
        Ok(summary)
    }
}
