//! Backup manager - orchestrates backup execution
//!
//! Walks the declarative task list group by group, resolves each group's
//! credential, and runs every task under a guard that absorbs its failure.
//! One broken task never stops the rest of the run; only an unresolvable
//! credential group marks the run itself as failed.

use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{Config, Credential, TaskConfig};
use crate::managers::notification::Notifier;
use crate::storage::s3::S3Opener;
use crate::storage::{ChunkedUploader, StoreError, StoreOpener, UploadError};
use crate::strategies::{ArchiveError, Compressor, DumpError, Dumper, DEFAULT_COMPRESSOR};
use crate::utils::TempArtifact;

/// Failure of a single backup task
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dump failed: {0}")]
    Dump(#[from] DumpError),

    #[error("compression failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("storage unavailable: {0}")]
    Storage(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Successful handler result
enum TaskStatus {
    Uploaded { key: String },
    Skipped { reason: String },
}

/// What became of one task, as recorded on the run summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { key: String },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub group: String,
    pub label: String,
    pub outcome: TaskOutcome,
}

/// Result of a whole run; task outcomes are independent of each other
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<TaskReport>,
    /// Backup groups whose credential group was missing from configuration
    pub unresolved_groups: Vec<String>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct BackupManager {
    config: Config,
    opener: Box<dyn StoreOpener>,
    notifier: Option<Notifier>,
    chunk_size: u64,
}

impl BackupManager {
    /// Create a backup manager uploading to S3
    pub fn new(config: Config) -> Self {
        Self::with_store_opener(config, Box::new(S3Opener::new()))
    }

    /// Create a backup manager with a specific store opener
    pub fn with_store_opener(config: Config, opener: Box<dyn StoreOpener>) -> Self {
        let notifier = config.notify.slack.clone().map(Notifier::new);
        let chunk_size = config.global.chunk_size_mb * 1024 * 1024;
        Self {
            config,
            opener,
            notifier,
            chunk_size,
        }
    }

    /// Run every configured backup task
    pub fn run(&self) -> RunSummary {
        info!("Backup started.");
        self.notify("Backup started.");

        let mut summary = RunSummary::default();

        let mut groups: Vec<_> = self.config.backup.iter().collect();
        groups.sort_by(|a, b| a.0.cmp(b.0));

        for (group, tasks) in groups {
            let Some(credential) = self.config.credentials.get(group) else {
                error!(
                    "Credential group '{}' not found in configuration, skipping {} task(s)",
                    group,
                    tasks.len()
                );
                summary.unresolved_groups.push(group.clone());
                continue;
            };

            for task in tasks {
                let label = task_label(task);
                let outcome = self.run_guarded(&label, || self.execute_task(credential, task));
                summary.reports.push(TaskReport {
                    group: group.clone(),
                    label,
                    outcome,
                });
            }
        }

        info!(
            "Backup summary: {} completed, {} skipped, {} failed",
            summary.completed(),
            summary.skipped(),
            summary.failed()
        );
        info!("Backup done.");
        self.notify("Backup done.");

        summary
    }

    /// Run one task, absorbing its failure
    ///
    /// This is the isolation boundary: whatever goes wrong inside the task is
    /// logged and turned into an outcome value, never propagated.
    fn run_guarded<F>(&self, label: &str, task: F) -> TaskOutcome
    where
        F: FnOnce() -> Result<TaskStatus, TaskError>,
    {
        info!("Backup task started: {}", label);
        match task() {
            Ok(TaskStatus::Uploaded { key }) => {
                info!("Backup task done: {} -> '{}'", label, key);
                TaskOutcome::Completed { key }
            }
            Ok(TaskStatus::Skipped { reason }) => {
                info!("Backup task skipped: {} ({})", label, reason);
                TaskOutcome::Skipped { reason }
            }
            Err(e) => {
                error!("Backup task failed: {}: {}", label, e);
                TaskOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Dispatch one task to its handler
    fn execute_task(
        &self,
        credential: &Credential,
        task: &TaskConfig,
    ) -> Result<TaskStatus, TaskError> {
        let store = self.opener.open(credential)?;
        let uploader = ChunkedUploader::new(store, &credential.bucket.name, &credential.bucket.path)
            .with_chunk_size(self.chunk_size);
        let compressor = compressor_for(task);

        match task.kind.as_str() {
            "file" => self.backup_file(task, compressor, &uploader),
            "dir" => self.backup_dir(task, compressor, &uploader),
            "db" => self.backup_db(task, compressor, &uploader),
            other => Err(TaskError::Configuration(format!(
                "unknown task type '{}'",
                other
            ))),
        }
    }

    /// Backup a single file
    fn backup_file(
        &self,
        task: &TaskConfig,
        compressor: Option<Compressor>,
        uploader: &ChunkedUploader,
    ) -> Result<TaskStatus, TaskError> {
        let path = require_path(task)?;
        if !path.is_file() {
            return Err(TaskError::InvalidInput(format!(
                "{} must be a regular file",
                path.display()
            )));
        }

        let object_name = render_output_name(&task.output_path);

        if let Some(compressor) = compressor {
            let archive = TempArtifact::new(self.scratch_path(&object_name)?);
            compressor.compress_file(path, archive.path())?;
            uploader.upload(archive.path(), &object_name)?;
        } else {
            uploader.upload(path, &object_name)?;
        }

        Ok(TaskStatus::Uploaded { key: object_name })
    }

    /// Backup a directory subtree
    ///
    /// Directories can only go up as archives; without a compressor the task
    /// is skipped rather than attempted.
    fn backup_dir(
        &self,
        task: &TaskConfig,
        compressor: Option<Compressor>,
        uploader: &ChunkedUploader,
    ) -> Result<TaskStatus, TaskError> {
        let path = require_path(task)?;
        if !path.is_dir() {
            return Err(TaskError::InvalidInput(format!(
                "{} must be a directory",
                path.display()
            )));
        }

        let Some(compressor) = compressor else {
            return Ok(TaskStatus::Skipped {
                reason: "directory backup requires a compressor".to_string(),
            });
        };

        let object_name = render_output_name(&task.output_path);
        let archive = TempArtifact::new(self.scratch_path(&object_name)?);
        compressor.compress_dir(path, archive.path())?;
        uploader.upload(archive.path(), &object_name)?;

        Ok(TaskStatus::Uploaded { key: object_name })
    }

    /// Backup a database via its dump tool
    fn backup_db(
        &self,
        task: &TaskConfig,
        compressor: Option<Compressor>,
        uploader: &ChunkedUploader,
    ) -> Result<TaskStatus, TaskError> {
        let engine = require(&task.engine, "engine")?;
        let database = require(&task.database, "database")?;
        let user = require(&task.user, "user")?;
        let password = require(&task.password, "password")?;

        let Some(dumper) = Dumper::resolve(engine) else {
            return Ok(TaskStatus::Skipped {
                reason: format!("no dump strategy for engine '{}'", engine),
            });
        };

        // The dump is deleted on every exit path below, success or failure
        let dump = TempArtifact::new(self.scratch_path(&format!("dump_{}.sql", database))?);
        dumper.dump(database, user, password, dump.path())?;

        let object_name = render_output_name(&task.output_path);

        if let Some(compressor) = compressor {
            let archive = TempArtifact::new(self.scratch_path(&object_name)?);
            compressor.compress_file(dump.path(), archive.path())?;
            uploader.upload(archive.path(), &object_name)?;
        } else {
            uploader.upload(dump.path(), &object_name)?;
        }

        Ok(TaskStatus::Uploaded { key: object_name })
    }

    /// Scratch-file path for an intermediate artifact
    fn scratch_path(&self, name: &str) -> Result<PathBuf, TaskError> {
        let dir = std::env::temp_dir().join("backhaul");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(name.replace('/', "_")))
    }

    /// Send a notification (best-effort, failures only warn)
    fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send(text) {
                warn!("Failed to send notification: {}", e);
            }
        }
    }
}

/// Resolve the compressor a task asked for, if any
fn compressor_for(task: &TaskConfig) -> Option<Compressor> {
    if !task.compress {
        return None;
    }
    let name = task.compressor.as_deref().unwrap_or(DEFAULT_COMPRESSOR);
    Compressor::resolve(name)
}

/// Render the destination object name from the task's timestamp template
fn render_output_name(pattern: &str) -> String {
    Local::now().format(pattern).to_string()
}

fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, TaskError> {
    value
        .as_deref()
        .ok_or_else(|| TaskError::Configuration(format!("missing required task key '{}'", key)))
}

fn require_path(task: &TaskConfig) -> Result<&Path, TaskError> {
    task.path
        .as_deref()
        .ok_or_else(|| TaskError::Configuration("missing required task key 'path'".to_string()))
}

fn task_label(task: &TaskConfig) -> String {
    match task.kind.as_str() {
        "db" => match &task.database {
            Some(db) => format!("db '{}'", db),
            None => "db".to_string(),
        },
        kind => match &task.path {
            Some(path) => format!("{} {}", kind, path.display()),
            None => kind.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(kind: &str) -> TaskConfig {
        TaskConfig {
            kind: kind.to_string(),
            output_path: "out".to_string(),
            compress: false,
            compressor: None,
            path: None,
            engine: None,
            database: None,
            user: None,
            password: None,
        }
    }

    #[test]
    fn test_render_output_name_literal_pattern() {
        assert_eq!(render_output_name("backup.zip"), "backup.zip");
    }

    #[test]
    fn test_render_output_name_formats_timestamp() {
        let name = render_output_name("backup-%Y.zip");
        let year = Local::now().format("%Y").to_string();
        assert_eq!(name, format!("backup-{}.zip", year));
    }

    #[test]
    fn test_compressor_for_disabled() {
        let t = task("file");
        assert_eq!(compressor_for(&t), None);
    }

    #[test]
    fn test_compressor_for_defaults_to_zip() {
        let mut t = task("file");
        t.compress = true;
        assert_eq!(compressor_for(&t), Some(Compressor::Zip));
    }

    #[test]
    fn test_compressor_for_unknown_engine_is_none() {
        let mut t = task("file");
        t.compress = true;
        t.compressor = Some("rar".to_string());
        assert_eq!(compressor_for(&t), None);
    }

    #[test]
    fn test_require_missing_key() {
        let t = task("db");
        let err = require(&t.database, "database").unwrap_err();
        assert!(matches!(err, TaskError::Configuration(_)));
        assert!(err.to_string().contains("database"));
    }

    #[test]
    fn test_task_labels() {
        let mut file = task("file");
        file.path = Some(PathBuf::from("/etc/hosts"));
        assert_eq!(task_label(&file), "file /etc/hosts");

        let mut db = task("db");
        db.database = Some("shop".to_string());
        assert_eq!(task_label(&db), "db 'shop'");

        assert_eq!(task_label(&task("tape-robot")), "tape-robot");
    }
}
