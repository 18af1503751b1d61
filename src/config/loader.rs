use super::types::*;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
///
/// Only structural defects are rejected here. A backup group referencing a
/// credential group that does not exist is left for the run to report, so the
/// other groups still get their turn.
fn validate_config(config: &Config) -> Result<()> {
    if config.global.chunk_size_mb == 0 {
        return Err(ConfigError::ValidationError(
            "chunk_size_mb must be greater than zero".to_string(),
        ));
    }

    if !config.backup.is_empty() && config.credentials.is_empty() {
        return Err(ConfigError::ValidationError(
            "backup tasks are defined but no credentials are configured".to_string(),
        ));
    }

    for (name, credential) in &config.credentials {
        if credential.bucket.name.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "credential group '{}' has an empty bucket name",
                name
            )));
        }
    }

    for (group, tasks) in &config.backup {
        for task in tasks {
            if task.output_path.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "a task in group '{}' has an empty output_path",
                    group
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents).map_err(ConfigError::ParseError)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r##"
[global]
chunk_size_mb = 8

[credentials.media]
key = "AKIAEXAMPLE"
secret = "hunter2"
region = "eu-west-1"

[credentials.media.bucket]
name = "my-backups"
path = "media"

[[backup.media]]
type = "file"
path = "/etc/hosts"
output_path = "hosts-%Y%m%d"
compress = true

[[backup.media]]
type = "db"
engine = "mysql"
database = "shop"
user = "root"
password = "pwd"
output_path = "shop-%Y%m%d.sql"

[notify.slack]
webhook = "https://hooks.slack.com/services/T/B/X"
channel = "#ops"
"##,
        )
        .unwrap();

        assert_eq!(config.global.chunk_size_mb, 8);
        assert_eq!(config.credentials["media"].bucket.name, "my-backups");
        assert_eq!(config.credentials["media"].region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.backup["media"].len(), 2);
        assert_eq!(config.backup["media"][0].kind, "file");
        assert!(config.backup["media"][0].compress);
        assert_eq!(config.backup["media"][1].database.as_deref(), Some("shop"));

        let slack = config.notify.slack.unwrap();
        assert_eq!(slack.channel, "#ops");
        // Unset fields fall back to defaults
        assert_eq!(slack.username, "backhaul");
        assert_eq!(slack.icon_emoji, ":shipit:");
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(
            r#"
[credentials.main]
key = "k"
secret = "s"

[credentials.main.bucket]
name = "bucket"
"#,
        )
        .unwrap();

        assert_eq!(config.global.chunk_size_mb, 50);
        assert_eq!(config.global.log_level, "info");
        assert!(config.backup.is_empty());
        assert!(config.notify.slack.is_none());
        assert_eq!(config.credentials["main"].bucket.path, "");
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let result = parse(
            r#"
[global]
chunk_size_mb = 0

[credentials.main]
key = "k"
secret = "s"

[credentials.main.bucket]
name = "bucket"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_tasks_without_credentials() {
        let result = parse(
            r#"
[credentials]

[[backup.main]]
type = "file"
path = "/etc/hosts"
output_path = "hosts"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_parse_error_on_malformed_toml() {
        let result = parse("not [valid toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_task_kind_survives_parsing() {
        // An unknown kind must reach dispatch, not fail the parse
        let config = parse(
            r#"
[credentials.main]
key = "k"
secret = "s"

[credentials.main.bucket]
name = "bucket"

[[backup.main]]
type = "tape-robot"
output_path = "out"
"#,
        )
        .unwrap();
        assert_eq!(config.backup["main"][0].kind, "tape-robot");
    }
}
