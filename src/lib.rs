//! Backhaul Library
//!
//! Declarative backup of files, directories, and databases to S3-compatible
//! object storage, with chunked multipart uploads and per-task fault
//! isolation.

pub mod config;
pub mod managers;
pub mod storage;
pub mod strategies;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config};
pub use managers::backup::{BackupManager, RunSummary, TaskOutcome};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::Notifier;
pub use storage::{ChunkedUploader, MultipartStore, StoreOpener, UploadError};
