use std::{path::Path, time::Duration};

use core_types::{DeletionSummary, FileLeft};
use task_core::TaskError;

/// What a single deletion run produced. Filled in by the worker, read-only once the run has
/// completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Files that were attempted but could not be deleted, in processing order.
    pub files_left: Vec<FileLeft>,
    /// Number of files the worker tried to delete before finishing or being cancelled.
    pub attempted: usize,
}

impl DeletionReport {
    pub fn paths_left(&self) -> impl Iterator<Item = &str> {
        self.files_left.iter().map(|f| f.path.as_str())
    }

    pub fn deleted(&self) -> usize {
        self.attempted - self.files_left.len()
    }

    /// Every attempted file was deleted. Says nothing about files never reached after a
    /// cancellation.
    pub fn all_deleted(&self) -> bool {
        self.files_left.is_empty()
    }

    pub(crate) fn record_deleted(&mut self) {
        self.attempted += 1;
    }

    pub(crate) fn record_failure(&mut self, path: &Path, err: &std::io::Error) {
        self.attempted += 1;
        self.files_left.push(FileLeft::from_io_error(path, err));
    }

    /// Builds the user facing summary. A faulted run keeps everything recorded before the fault.
    pub fn into_summary(
        self,
        total_files: usize,
        cancelled: bool,
        error: Option<&TaskError>,
        elapsed: Duration,
    ) -> DeletionSummary {
        DeletionSummary {
            total_files,
            attempted: self.attempted,
            deleted: self.deleted(),
            cancelled,
            elapsed_ms: elapsed.as_millis() as u64,
            files_left: self.files_left,
            error: error.map(ToString::to_string),
        }
    }
}
