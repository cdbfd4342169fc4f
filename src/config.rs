//! Configuration for the review engine, read from `.warden/warden.toml`.
//!
//! Settings are layered: file → environment (`WARDEN_*`) → CLI flags. A
//! missing file means defaults throughout.
//!
//! # Configuration File Format
//!
//! ```toml
//! [history]
//! max_size = 50
//!
//! [consensus]
//! minimum_votes_required = 10
//! vote_consensus_threshold = 0.8
//!
//! [fatigue]
//! max_reviews_before_break = 50
//! session_window_secs = 3600
//! min_break_secs = 900
//!
//! [accuracy]
//! floor = 0.4
//! min_sample_size = 20
//!
//! [collision]
//! recent_viewer_window_secs = 300
//!
//! [audit]
//! queue_capacity = 1024
//! log_file = "activity.jsonl"
//! ```

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_common::ReasonKind;

use crate::audit::{AuditDispatcher, DEFAULT_QUEUE_CAPACITY, JsonlActivityLog};
use crate::gates::accuracy::{DEFAULT_ACCURACY_FLOOR, DEFAULT_MIN_SAMPLE_SIZE};
use crate::gates::consensus::{DEFAULT_MINIMUM_VOTES_REQUIRED, DEFAULT_VOTE_CONSENSUS_THRESHOLD};
use crate::gates::fatigue::DEFAULT_MAX_REVIEWS_BEFORE_BREAK;
use crate::gates::{ConsensusGate, FatigueThrottle, VoteAccuracyGatekeeper};
use crate::review::DEFAULT_MAX_HISTORY_SIZE;
use crate::session::{ReviewSettings, SessionController};
use crate::store::{ActivityLog, EntityStore, PermissionOracle, VoteStore};
use crate::util::Clock;

/// Name of the per-project configuration directory.
pub const WARDEN_DIR: &str = ".warden";

/// Name of the configuration file inside [`WARDEN_DIR`].
pub const CONFIG_FILE: &str = "warden.toml";

pub fn get_warden_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(WARDEN_DIR)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySection {
    #[serde(default = "default_history_size")]
    pub max_size: usize,
}

fn default_history_size() -> usize {
    DEFAULT_MAX_HISTORY_SIZE
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_size: default_history_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSection {
    /// Votes needed before the consensus check applies.
    #[serde(default = "default_minimum_votes")]
    pub minimum_votes_required: u32,
    /// Opposing vote share at which a binding decision is blocked.
    #[serde(default = "default_consensus_threshold")]
    pub vote_consensus_threshold: f64,
}

fn default_minimum_votes() -> u32 {
    DEFAULT_MINIMUM_VOTES_REQUIRED
}

fn default_consensus_threshold() -> f64 {
    DEFAULT_VOTE_CONSENSUS_THRESHOLD
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            minimum_votes_required: default_minimum_votes(),
            vote_consensus_threshold: default_consensus_threshold(),
        }
    }
}

impl ConsensusSection {
    pub fn to_gate(&self) -> ConsensusGate {
        ConsensusGate::new(self.minimum_votes_required, self.vote_consensus_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueSection {
    #[serde(default = "default_max_reviews")]
    pub max_reviews_before_break: u32,
    #[serde(default = "default_session_window_secs")]
    pub session_window_secs: u64,
    #[serde(default = "default_min_break_secs")]
    pub min_break_secs: u64,
}

fn default_max_reviews() -> u32 {
    DEFAULT_MAX_REVIEWS_BEFORE_BREAK
}

fn default_session_window_secs() -> u64 {
    3600
}

fn default_min_break_secs() -> u64 {
    900
}

impl Default for FatigueSection {
    fn default() -> Self {
        Self {
            max_reviews_before_break: default_max_reviews(),
            session_window_secs: default_session_window_secs(),
            min_break_secs: default_min_break_secs(),
        }
    }
}

impl FatigueSection {
    pub fn to_throttle(&self) -> FatigueThrottle {
        FatigueThrottle::new(
            self.max_reviews_before_break,
            secs(self.session_window_secs),
            secs(self.min_break_secs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySection {
    #[serde(default = "default_accuracy_floor")]
    pub floor: f64,
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: u32,
}

fn default_accuracy_floor() -> f64 {
    DEFAULT_ACCURACY_FLOOR
}

fn default_min_sample_size() -> u32 {
    DEFAULT_MIN_SAMPLE_SIZE
}

impl Default for AccuracySection {
    fn default() -> Self {
        Self {
            floor: default_accuracy_floor(),
            min_sample_size: default_min_sample_size(),
        }
    }
}

impl AccuracySection {
    pub fn to_gatekeeper(&self) -> VoteAccuracyGatekeeper {
        VoteAccuracyGatekeeper::new(self.floor, self.min_sample_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionSection {
    #[serde(default = "default_recent_viewer_window_secs")]
    pub recent_viewer_window_secs: u64,
}

fn default_recent_viewer_window_secs() -> u64 {
    300
}

impl Default for CollisionSection {
    fn default() -> Self {
        Self {
            recent_viewer_window_secs: default_recent_viewer_window_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSection {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Activity log path, relative to the `.warden` directory unless absolute.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_log_file() -> PathBuf {
    PathBuf::from("activity.jsonl")
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            log_file: default_log_file(),
        }
    }
}

/// Longest duration setting accepted without a warning: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// The complete warden.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WardenToml {
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub consensus: ConsensusSection,
    #[serde(default)]
    pub fatigue: FatigueSection,
    #[serde(default)]
    pub accuracy: AccuracySection,
    #[serde(default)]
    pub collision: CollisionSection,
    #[serde(default)]
    pub audit: AuditSection,
}

impl WardenToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse warden.toml")
    }

    /// Load `warden.toml` from the given `.warden` directory, or defaults if absent.
    pub fn load_or_default(warden_dir: &Path) -> Result<Self> {
        let config_path = warden_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize warden.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `WARDEN_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `WARDEN_*` overrides using `lookup` to read variables.
    /// Returns a warning for each value that failed to parse; those are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();

        fn set<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            slot: &mut T,
            warnings: &mut Vec<String>,
        ) {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse() {
                    Ok(value) => *slot = value,
                    Err(_) => warnings.push(format!("Ignoring {}: cannot parse '{}'", key, raw)),
                }
            }
        }

        set(&lookup, "WARDEN_HISTORY_MAX_SIZE", &mut self.history.max_size, &mut warnings);
        set(
            &lookup,
            "WARDEN_MINIMUM_VOTES_REQUIRED",
            &mut self.consensus.minimum_votes_required,
            &mut warnings,
        );
        set(
            &lookup,
            "WARDEN_VOTE_CONSENSUS_THRESHOLD",
            &mut self.consensus.vote_consensus_threshold,
            &mut warnings,
        );
        set(
            &lookup,
            "WARDEN_MAX_REVIEWS_BEFORE_BREAK",
            &mut self.fatigue.max_reviews_before_break,
            &mut warnings,
        );
        set(&lookup, "WARDEN_ACCURACY_FLOOR", &mut self.accuracy.floor, &mut warnings);
        set(&lookup, "WARDEN_AUDIT_LOG_FILE", &mut self.audit.log_file, &mut warnings);

        warnings
    }

    pub fn to_review_settings(&self) -> ReviewSettings {
        ReviewSettings {
            max_history_size: self.history.max_size,
            consensus: self.consensus.to_gate(),
            fatigue: self.fatigue.to_throttle(),
            accuracy: self.accuracy.to_gatekeeper(),
            recent_viewer_window: secs(self.collision.recent_viewer_window_secs),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.history.max_size == 0 {
            warnings.push("history.max_size is 0; one entry will be kept".to_string());
        }
        let threshold = self.consensus.vote_consensus_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            warnings.push(format!(
                "consensus.vote_consensus_threshold {} should be in (0, 1]",
                threshold
            ));
        }
        let floor = self.accuracy.floor;
        if !(floor > 0.0 && floor <= 1.0) {
            warnings.push(format!("accuracy.floor {} should be in (0, 1]", floor));
        }
        if self.fatigue.max_reviews_before_break == 0 {
            warnings.push(
                "fatigue.max_reviews_before_break is 0; every review will require a break"
                    .to_string(),
            );
        }
        if self.fatigue.session_window_secs == 0 {
            warnings.push("fatigue.session_window_secs is 0".to_string());
        }
        if self.fatigue.min_break_secs == 0 {
            warnings.push("fatigue.min_break_secs is 0; breaks end immediately".to_string());
        }
        if self.collision.recent_viewer_window_secs == 0 {
            warnings.push(
                "collision.recent_viewer_window_secs is 0; collision warnings are disabled"
                    .to_string(),
            );
        }
        for (key, value) in [
            ("fatigue.session_window_secs", self.fatigue.session_window_secs),
            ("fatigue.min_break_secs", self.fatigue.min_break_secs),
            ("collision.recent_viewer_window_secs", self.collision.recent_viewer_window_secs),
        ] {
            if value > MAX_DURATION_SECS {
                warnings.push(format!(
                    "{} {} exceeds one year ({}s)",
                    key, value, MAX_DURATION_SECS
                ));
            }
        }
        if self.audit.queue_capacity == 0 {
            warnings.push("audit.queue_capacity is 0; a capacity of 1 will be used".to_string());
        }

        warnings
    }
}

/// Resolved configuration for a project.
///
/// It merges settings from:
/// 1. warden.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct WardenConfig {
    pub project_dir: PathBuf,
    pub warden_dir: PathBuf,
    pub toml: WardenToml,
    /// Environment values that could not be applied.
    pub env_warnings: Vec<String>,
    pub verbose: bool,
    /// CLI override for the activity log path.
    pub cli_log_file: Option<PathBuf>,
}

impl WardenConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let warden_dir = get_warden_dir(&project_dir);
        let mut toml = WardenToml::load_or_default(&warden_dir)?;
        let env_warnings = toml.apply_env();

        Ok(Self {
            project_dir,
            warden_dir,
            toml,
            env_warnings,
            verbose: false,
            cli_log_file: None,
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, verbose: bool, log_file: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_log_file = log_file;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.warden_dir.join(CONFIG_FILE)
    }

    /// Activity log path (CLI → env → file → default).
    pub fn activity_log_path(&self) -> PathBuf {
        match &self.cli_log_file {
            Some(path) => path.clone(),
            None if self.toml.audit.log_file.is_absolute() => self.toml.audit.log_file.clone(),
            None => self.warden_dir.join(&self.toml.audit.log_file),
        }
    }

    pub fn review_settings(&self) -> ReviewSettings {
        self.toml.to_review_settings()
    }

    /// The JSONL activity log at [`Self::activity_log_path`].
    pub fn activity_log(&self) -> Arc<JsonlActivityLog> {
        Arc::new(JsonlActivityLog::new(self.activity_log_path()))
    }

    /// Start an audit writer sized by `[audit] queue_capacity`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn audit_dispatcher(&self, log: Arc<dyn ActivityLog>) -> AuditDispatcher {
        AuditDispatcher::spawn(log, self.toml.audit.queue_capacity)
    }

    /// Build a controller over the host's stores, logging to the configured
    /// activity log with every configured tunable applied.
    ///
    /// Must be called inside a tokio runtime.
    pub fn session_controller<K: ReasonKind>(
        &self,
        entities: Arc<dyn EntityStore<K>>,
        votes: Arc<dyn VoteStore>,
        permissions: Arc<dyn PermissionOracle>,
        clock: Arc<dyn Clock>,
    ) -> SessionController<K> {
        let log: Arc<dyn ActivityLog> = self.activity_log();
        let audit = self.audit_dispatcher(Arc::clone(&log));
        SessionController::new(entities, votes, log, permissions, audit, clock)
            .with_settings(self.review_settings())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.env_warnings.clone();
        warnings.extend(self.toml.validate());
        warnings
    }
}
