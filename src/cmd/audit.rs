//! `warden audit`: activity log inspection.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use warden::config::WardenConfig;
use warden::store::ActivityLog;
use warden::{ActivityFilter, ActivityLogEntry};

use super::super::AuditCommands;

pub async fn cmd_audit(config: &WardenConfig, command: &AuditCommands) -> Result<()> {
    let path = config.activity_log_path();
    let log = config.activity_log();
    tracing::debug!(path = %path.display(), "Reading activity log");

    match command {
        AuditCommands::Show {
            reviewer,
            target,
            kind,
            activity,
            limit,
            json,
        } => {
            let filter = ActivityFilter {
                reviewer_id: *reviewer,
                target_id: *target,
                target_kind: *kind,
                activity_type: *activity,
                since: None,
                limit: Some(*limit),
            };
            let entries = log
                .query(&filter)
                .await
                .context("Failed to read activity log")?;

            if entries.is_empty() {
                println!("No matching activity in {}", path.display());
                return Ok(());
            }
            for entry in &entries {
                if *json {
                    println!("{}", serde_json::to_string(entry)?);
                } else {
                    println!("{}", format_entry(entry));
                }
            }
        }
        AuditCommands::Viewers {
            target,
            kind,
            window_secs,
        } => {
            let window_secs =
                window_secs.unwrap_or(config.toml.collision.recent_viewer_window_secs);
            let window = i64::try_from(window_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .context("Window is too large")?;
            let since = Utc::now()
                .checked_sub_signed(window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let viewers = log
                .recent_viewers(*kind, *target, since)
                .await
                .context("Failed to read activity log")?;

            if viewers.is_empty() {
                println!(
                    "No reviewers viewed {} {} in the last {}s.",
                    kind, target, window_secs
                );
            } else {
                println!("Recent viewers of {} {}:", kind, target);
                for viewer in viewers {
                    println!("  - reviewer {}", viewer);
                }
            }
        }
    }
    Ok(())
}

fn format_entry(entry: &ActivityLogEntry) -> String {
    let target = match (entry.target_kind, entry.target_id) {
        (Some(kind), Some(id)) => format!("{} {}", kind, id),
        _ => "-".to_string(),
    };
    let mut line = format!(
        "{}  reviewer {:<6} {:<20} {}",
        console::style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
        entry.reviewer_id,
        entry.activity_type.to_string(),
        target
    );
    if !entry.details.is_null() {
        line.push_str(&format!("  {}", entry.details));
    }
    line
}
