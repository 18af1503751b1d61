use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    /// Object storage credentials, keyed by credential-group name
    pub credentials: HashMap<String, Credential>,

    /// Backup tasks, keyed by the credential group they upload with
    #[serde(default)]
    pub backup: HashMap<String, Vec<TaskConfig>>,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Upload part size in MiB
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// One set of object-storage credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credential {
    pub key: String,
    pub secret: String,
    pub bucket: Bucket,

    /// Storage region; falls back to the SDK default when absent or unparsable
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Bucket {
    pub name: String,

    /// Key prefix under which all objects for this credential group land
    #[serde(default)]
    pub path: String,
}

/// One backup task descriptor
///
/// `kind` stays a free-form string on purpose: an unrecognized kind is a
/// per-task failure at dispatch time, never a config-parse failure that would
/// take down the whole run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskConfig {
    #[serde(rename = "type")]
    pub kind: String,

    /// Timestamp-format template producing the destination object name
    pub output_path: String,

    #[serde(default)]
    pub compress: bool,

    /// Compression engine name; defaults to "zip" when `compress` is set
    #[serde(default)]
    pub compressor: Option<String>,

    /// Source path (file and dir tasks)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Database connection info (db tasks)
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub slack: Option<SlackConfig>,
}

/// Slack-style webhook settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlackConfig {
    pub webhook: String,

    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: String,
}

// Default value functions

fn default_chunk_size_mb() -> u64 { 50 }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_channel() -> String { "#general".to_string() }
fn default_username() -> String { "backhaul".to_string() }
fn default_icon_emoji() -> String { ":shipit:".to_string() }
