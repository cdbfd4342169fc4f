use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use warden_common::{ActivityFilter, ActivityLogEntry};

use crate::errors::StoreError;
use crate::store::ActivityLog;

/// Append-only activity log stored as one JSON object per line.
pub struct JsonlActivityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, entry: &ActivityLogEntry) -> Result<()> {
        let line = serde_json::to_string(entry).context("Failed to serialize activity entry")?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Activity log write lock poisoned"))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create activity log directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open activity log {}", self.path.display()))?;
        writeln!(file, "{}", line).context("Failed to append activity entry")?;
        Ok(())
    }

    /// Every entry in file order. A missing file is an empty log.
    ///
    /// Lines that fail to parse (for example a write cut short by a crash) are
    /// skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<ActivityLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read activity log {}", self.path.display()))?;

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ActivityLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "Skipping malformed activity log line"
                ),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl ActivityLog for JsonlActivityLog {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), StoreError> {
        self.append_line(&entry).map_err(StoreError::Backend)
    }

    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let entries = self.read_all().map_err(StoreError::Backend)?;
        Ok(filter.apply(entries.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use warden_common::{ActivityType, EntityKind};

    fn setup_log() -> (JsonlActivityLog, TempDir) {
        let dir = TempDir::new().unwrap();
        let log = JsonlActivityLog::new(dir.path().join("audit").join("activity.jsonl"));
        (log, dir)
    }

    #[tokio::test]
    async fn test_append_creates_file_and_parent_dirs() {
        let (log, _dir) = setup_log();
        assert!(!log.path().exists());

        log.append(ActivityLogEntry::new(1, ActivityType::Viewed, Utc::now()))
            .await
            .unwrap();

        assert!(log.path().exists());
        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"viewed\""));
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let (log, _dir) = setup_log();
        assert!(log.read_all().unwrap().is_empty());
        assert!(
            log.query(&ActivityFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_query_filters_and_recent_viewers() {
        let (log, _dir) = setup_log();
        let now = Utc::now();
        let entries = [
            (1, ActivityType::Viewed, 10, now - Duration::minutes(20)),
            (2, ActivityType::Viewed, 10, now - Duration::minutes(2)),
            (3, ActivityType::Confirmed, 10, now - Duration::minutes(1)),
            (4, ActivityType::Viewed, 11, now),
        ];
        for (reviewer, activity, target, at) in entries {
            log.append(
                ActivityLogEntry::new(reviewer, activity, at).with_target(EntityKind::User, target),
            )
            .await
            .unwrap();
        }

        let confirmed = log
            .query(&ActivityFilter {
                activity_type: Some(ActivityType::Confirmed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].reviewer_id, 3);

        let viewers = log
            .recent_viewers(EntityKind::User, 10, now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(viewers, vec![2]);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (log, _dir) = setup_log();
        log.append(ActivityLogEntry::new(1, ActivityType::Skipped, Utc::now()))
            .await
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "{{\"truncated\":").unwrap();
        log.append(ActivityLogEntry::new(2, ActivityType::Skipped, Utc::now()))
            .await
            .unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].reviewer_id, 2);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_backend_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be.
        let log = JsonlActivityLog::new(dir.path());
        let err = log
            .append(ActivityLogEntry::new(1, ActivityType::Viewed, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
