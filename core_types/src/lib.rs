use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Why a file could not be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionFailureReason {
    #[strum(serialize = "Not found")]
    NotFound,
    #[strum(serialize = "Permission denied")]
    PermissionDenied,
    #[strum(serialize = "In use")]
    InUse,
    Other,
}

#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;

impl From<&io::Error> for DeletionFailureReason {
    fn from(err: &io::Error) -> Self {
        #[cfg(windows)]
        if err.raw_os_error() == Some(ERROR_SHARING_VIOLATION) {
            return DeletionFailureReason::InUse;
        }

        match err.kind() {
            io::ErrorKind::NotFound => DeletionFailureReason::NotFound,
            io::ErrorKind::PermissionDenied => DeletionFailureReason::PermissionDenied,
            io::ErrorKind::ResourceBusy => DeletionFailureReason::InUse,
            _ => DeletionFailureReason::Other,
        }
    }
}

/// A file that was attempted but left in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLeft {
    pub path: String,
    pub reason: DeletionFailureReason,
    pub message: String,
}

impl FileLeft {
    pub fn from_io_error(path: &Path, err: &io::Error) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            reason: DeletionFailureReason::from(err),
            message: err.to_string(),
        }
    }
}

/// Outcome of one batch deletion as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub total_files: usize,
    pub attempted: usize,
    pub deleted: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
    pub files_left: Vec<FileLeft>,
    /// Set when the run stopped on a fault. The counts and `files_left` still hold what was
    /// recorded up to that point.
    pub error: Option<String>,
}

impl DeletionSummary {
    pub fn all_deleted(&self) -> bool {
        !self.cancelled
            && self.error.is_none()
            && self.files_left.is_empty()
            && self.deleted == self.total_files
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_reason_from_io_error_kind() {
        let not_found = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(
            DeletionFailureReason::from(&not_found),
            DeletionFailureReason::NotFound
        );

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(
            DeletionFailureReason::from(&denied),
            DeletionFailureReason::PermissionDenied
        );

        let busy = io::Error::from(io::ErrorKind::ResourceBusy);
        assert_eq!(
            DeletionFailureReason::from(&busy),
            DeletionFailureReason::InUse
        );

        let other = io::Error::other("something odd");
        assert_eq!(
            DeletionFailureReason::from(&other),
            DeletionFailureReason::Other
        );
    }

    #[test]
    fn test_reason_display() {
        let labels: Vec<String> = DeletionFailureReason::iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(
            labels,
            vec!["Not found", "Permission denied", "In use", "Other"]
        );
    }

    #[test]
    fn test_summary_json_uses_snake_case_reasons() {
        let summary = DeletionSummary {
            total_files: 2,
            attempted: 2,
            deleted: 1,
            cancelled: false,
            elapsed_ms: 12,
            files_left: vec![FileLeft {
                path: "/tmp/locked.bin".to_string(),
                reason: DeletionFailureReason::PermissionDenied,
                message: "Permission denied".to_string(),
            }],
            error: None,
        };
        assert!(!summary.all_deleted());

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"permission_denied\""));
        let parsed: DeletionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn test_faulted_summary_is_not_all_deleted() {
        let summary = DeletionSummary {
            total_files: 0,
            attempted: 0,
            deleted: 0,
            cancelled: false,
            elapsed_ms: 0,
            files_left: vec![],
            error: Some("Worker panicked: driver crashed".to_string()),
        };
        assert!(!summary.all_deleted());
        assert!(summary.to_json().unwrap().contains("driver crashed"));
    }
}
