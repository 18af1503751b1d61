mod config;
mod managers;
mod storage;
mod strategies;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use managers::backup::BackupManager;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backhaul")]
#[command(about = "Backup files, directories, and databases to object storage", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "backhaul.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all configured backup tasks
    Run,

    /// Validate configuration file
    Validate,

    /// List configured backup tasks
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            // Full logging with file rotation (must keep guard alive)
            let logging_config = managers::logging::LoggingConfig::from_config(
                &config.global.log_directory,
                &config.global.log_level,
                config.global.log_max_files,
            );
            let _log_guard = managers::logging::init_logging(&logging_config)?;

            // One run at a time
            let _lock = utils::RunLock::acquire("run")?;

            let manager = BackupManager::new(config);
            let summary = manager.run();

            println!(
                "Backup finished: {} completed, {} skipped, {} failed",
                summary.completed(),
                summary.skipped(),
                summary.failed()
            );
            for report in &summary.reports {
                match &report.outcome {
                    managers::backup::TaskOutcome::Completed { key } => {
                        println!("  ✓ [{}] {} -> {}", report.group, report.label, key)
                    }
                    managers::backup::TaskOutcome::Skipped { reason } => {
                        println!("  - [{}] {} ({})", report.group, report.label, reason)
                    }
                    managers::backup::TaskOutcome::Failed { error } => {
                        eprintln!("  ✗ [{}] {}: {}", report.group, report.label, error)
                    }
                }
            }

            if !summary.unresolved_groups.is_empty() {
                anyhow::bail!(
                    "missing credentials for group(s): {}",
                    summary.unresolved_groups.join(", ")
                );
            }
        }

        Commands::Validate => {
            managers::logging::init_console_logging();
            let task_count: usize = config.backup.values().map(|tasks| tasks.len()).sum();
            println!("Configuration is valid!");
            println!("Credential groups: {}", config.credentials.len());
            println!("Backup tasks: {}", task_count);
        }

        Commands::List => {
            managers::logging::init_console_logging();
            let mut groups: Vec<_> = config.backup.iter().collect();
            groups.sort_by(|a, b| a.0.cmp(b.0));

            println!("Configured backup tasks:");
            for (group, tasks) in groups {
                println!("  [{}]", group);
                for task in tasks {
                    let compress = if task.compress {
                        task.compressor.as_deref().unwrap_or("zip")
                    } else {
                        "none"
                    };
                    println!(
                        "    {} -> {} (compress: {})",
                        task.kind, task.output_path, compress
                    );
                }
            }
        }
    }

    Ok(())
}
