pub mod error;
pub mod file_deletion;
pub mod file_system_ops;
pub mod settings;
