//! `warden config`: view, validate and initialize configuration.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use warden::config::{CONFIG_FILE, WardenConfig, WardenToml, get_warden_dir};

    let warden_dir = get_warden_dir(project_dir);
    let config_path = warden_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", console::style("Warden Configuration").bold());
            println!("====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_sections(&WardenToml::load(&config_path)?);

                println!("Effective values (with env/CLI overrides):");
                let config = WardenConfig::new(project_dir.to_path_buf())?;
                print_sections(&config.toml);
                println!("  activity log = {}", config.activity_log_path().display());
                println!();
            } else {
                println!("No warden.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                println!();
                print_sections(&WardenToml::default());
                println!("Run 'warden config init' to create a warden.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No warden.toml found. Using defaults (valid).");
                return Ok(());
            }

            let config = WardenConfig::new(project_dir.to_path_buf())?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("{}", console::style("Configuration warnings:").yellow());
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("warden.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !warden_dir.exists() {
                std::fs::create_dir_all(&warden_dir)?;
            }

            WardenToml::default().save(&config_path)?;

            println!("Created warden.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [consensus] minimum_votes_required, vote_consensus_threshold");
            println!("  - [fatigue] max_reviews_before_break, session_window_secs, min_break_secs");
            println!("  - [accuracy] floor, min_sample_size");
            println!("  - [audit] log_file, queue_capacity");
            println!();
        }
    }

    Ok(())
}

fn print_sections(toml: &warden::config::WardenToml) {
    println!("[history]");
    println!("  max_size = {}", toml.history.max_size);
    println!();
    println!("[consensus]");
    println!(
        "  minimum_votes_required = {}",
        toml.consensus.minimum_votes_required
    );
    println!(
        "  vote_consensus_threshold = {}",
        toml.consensus.vote_consensus_threshold
    );
    println!();
    println!("[fatigue]");
    println!(
        "  max_reviews_before_break = {}",
        toml.fatigue.max_reviews_before_break
    );
    println!("  session_window_secs = {}", toml.fatigue.session_window_secs);
    println!("  min_break_secs = {}", toml.fatigue.min_break_secs);
    println!();
    println!("[accuracy]");
    println!("  floor = {}", toml.accuracy.floor);
    println!("  min_sample_size = {}", toml.accuracy.min_sample_size);
    println!();
    println!("[collision]");
    println!(
        "  recent_viewer_window_secs = {}",
        toml.collision.recent_viewer_window_secs
    );
    println!();
    println!("[audit]");
    println!("  queue_capacity = {}", toml.audit.queue_capacity);
    println!("  log_file = \"{}\"", toml.audit.log_file.display());
    println!();
}
