use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden::telemetry::{LogFormat, init_logging};
use warden::{ActivityType, EntityKind, ReviewerId};

mod cmd;

#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about = "Moderation review engine: configuration and activity log tools")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Activity log file. Overrides `[audit] log_file` in warden.toml.
    #[arg(long, global = true)]
    pub activity_log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// View, validate, or create warden.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Inspect the activity log
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default warden.toml file
    Init,
}

#[derive(Subcommand, Clone)]
pub enum AuditCommands {
    /// List activity entries, newest last
    Show {
        #[arg(long)]
        reviewer: Option<ReviewerId>,
        #[arg(long)]
        target: Option<u64>,
        /// Entity kind of --target (user or group)
        #[arg(long)]
        kind: Option<EntityKind>,
        /// Activity type, e.g. confirmed or training_upvote
        #[arg(long = "type")]
        activity: Option<ActivityType>,
        /// Show only the newest N entries
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Print raw JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Reviewers who recently viewed a target
    Viewers {
        target: u64,
        #[arg(long, default_value_t = EntityKind::User)]
        kind: EntityKind,
        /// Look-back window in seconds (defaults to [collision] recent_viewer_window_secs)
        #[arg(long)]
        window_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
        Commands::Audit { command } => {
            let config = warden::config::WardenConfig::with_cli_args(
                project_dir,
                cli.verbose,
                cli.activity_log.clone(),
            )?;
            cmd::cmd_audit(&config, command).await?
        }
    }

    Ok(())
}
