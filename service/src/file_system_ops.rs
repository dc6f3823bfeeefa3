//! File system operations abstraction for testing
//!
//! This module provides a trait-based abstraction over the file system calls made while
//! deleting files, allowing the deletion task to be tested without touching the real file
//! system.
//!
//! # Usage in Production
//!
//! ```rust,ignore
//! use service::file_deletion::service::FileDeletionService;
//!
//! // Uses the default implementation (StdFileSystemOps)
//! let service = FileDeletionService::new(settings);
//! ```
//!
//! # Usage in Tests
//!
//! ```rust,ignore
//! use service::file_system_ops::mock::MockFileSystemOps;
//!
//! let mock_fs = Arc::new(MockFileSystemOps::new());
//! mock_fs.add_file("/test/file_1.bin");
//!
//! let service = FileDeletionService::new_with_fs_ops(settings, mock_fs.clone());
//!
//! // Run a deletion...
//!
//! assert!(mock_fs.was_deleted("/test/file_1.bin"));
//! ```

use std::io;
use std::path::Path;

/// Trait for file system operations to enable testing
pub trait FileSystemOps: Send + Sync {
    /// Remove a file at the given path
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Production implementation using std::fs
#[derive(Debug, Clone, Copy)]
pub struct StdFileSystemOps;

impl FileSystemOps for StdFileSystemOps {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}
