use std::{path::PathBuf, sync::Arc, thread};

use task_core::{TaskContext, TaskError, TaskWorker};

use crate::{
    file_deletion::model::DeletionReport, file_system_ops::FileSystemOps,
    settings::DeletionSettings,
};

/// Deletes a fixed list of files one by one.
///
/// Cancellation is checked before each file. A file that cannot be deleted is recorded in the
/// report and the run moves on to the next one.
pub struct FileDeletionTask {
    files: Vec<PathBuf>,
    fs_ops: Arc<dyn FileSystemOps>,
    settings: Arc<DeletionSettings>,
}

impl FileDeletionTask {
    pub fn new<I, P>(
        files: I,
        fs_ops: Arc<dyn FileSystemOps>,
        settings: Arc<DeletionSettings>,
    ) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            fs_ops,
            settings,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl TaskWorker for FileDeletionTask {
    type Output = DeletionReport;

    fn name(&self) -> &'static str {
        "file-deletion"
    }

    fn run(
        &mut self,
        context: &TaskContext<'_>,
        report: &mut DeletionReport,
    ) -> Result<(), TaskError> {
        let total = self.files.len();
        if total == 0 {
            tracing::info!("No files to delete");
            return Ok(());
        }
        tracing::info!(total, "Deleting files");

        for (index, path) in self.files.iter().enumerate() {
            if context.is_cancelled() {
                tracing::info!(processed = index, total, "File deletion cancelled");
                return Ok(());
            }

            if !self.settings.item_delay.is_zero() {
                thread::sleep(self.settings.item_delay);
            }

            match self.fs_ops.remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Deleted file");
                    report.record_deleted();
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete file");
                    report.record_failure(path, &e);
                }
            }

            context.report_progress(index + 1, total)?;
        }

        tracing::info!(
            deleted = report.deleted(),
            left = report.files_left.len(),
            "File deletion finished"
        );
        Ok(())
    }
}
