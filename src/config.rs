//! Configuration management for StudySync
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, StudySyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for StudySync
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session database location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Proposal and finalization policies
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    /// Confirmation message delivery
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Shared file handling
    #[serde(default)]
    pub resources: ResourcesConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Database path; the platform data directory is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// How the proposal deadline is applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Late proposals are accepted and a warning is logged
    #[default]
    Advisory,
    /// Late proposals are rejected
    Enforce,
}

/// What happens when a finalized session is finalized again
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefinalizePolicy {
    /// The new slot replaces the old one (last write wins)
    #[default]
    Overwrite,
    /// Re-finalization fails with `AlreadyFinalized`
    Reject,
}

/// Scheduling policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Deadline handling for late proposals
    #[serde(default)]
    pub deadline_policy: DeadlinePolicy,

    /// Only invited participants and the host may propose slots
    #[serde(default = "default_true")]
    pub restrict_proposals_to_participants: bool,

    /// A manually chosen final slot must be one of the proposed slots
    #[serde(default = "default_true")]
    pub require_proposed_final_slot: bool,

    /// Re-finalization behavior
    #[serde(default)]
    pub refinalize: RefinalizePolicy,
}

fn default_true() -> bool {
    true
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            deadline_policy: DeadlinePolicy::default(),
            restrict_proposals_to_participants: true,
            require_proposed_final_slot: true,
            refinalize: RefinalizePolicy::default(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Delivery backend: "log" or "sendgrid"
    #[serde(default = "default_notifier")]
    pub provider: String,

    /// Sender address for confirmation messages
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// SendGrid settings
    #[serde(default)]
    pub sendgrid: SendGridConfig,
}

fn default_notifier() -> String {
    "log".to_string()
}

fn default_from_address() -> String {
    "noreply@studysync.local".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            provider: default_notifier(),
            from_address: default_from_address(),
            sendgrid: SendGridConfig::default(),
        }
    }
}

/// SendGrid API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendGridConfig {
    /// API key; usually supplied through `SENDGRID_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (overridable for tests and local mocks)
    #[serde(default = "default_sendgrid_api_base")]
    pub api_base: String,
}

fn default_sendgrid_api_base() -> String {
    "https://api.sendgrid.com".to_string()
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_sendgrid_api_base(),
        }
    }
}

/// Shared resource configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Directory receiving uploaded files; defaults next to the database
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Accepted file extensions (lowercase, without dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string(), "pptx".to_string()]
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also append log output to this file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "studysync=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StudySyncError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| StudySyncError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(db_path) = std::env::var(crate::storage::DB_PATH_ENV) {
            tracing::debug!(db_path = %db_path, "Env override: STUDYSYNC_DB");
            self.storage.path = Some(PathBuf::from(db_path));
        }

        if let Ok(policy) = std::env::var("STUDYSYNC_DEADLINE_POLICY") {
            match policy.to_lowercase().as_str() {
                "advisory" => self.scheduling.deadline_policy = DeadlinePolicy::Advisory,
                "enforce" => self.scheduling.deadline_policy = DeadlinePolicy::Enforce,
                _ => tracing::warn!("Invalid STUDYSYNC_DEADLINE_POLICY: {}", policy),
            }
        }

        if let Ok(provider) = std::env::var("STUDYSYNC_NOTIFIER") {
            self.notifications.provider = provider;
        }

        if let Ok(from) = std::env::var("STUDYSYNC_FROM_ADDRESS") {
            self.notifications.from_address = from;
        }

        if let Ok(api_key) = std::env::var("SENDGRID_API_KEY") {
            self.notifications.sendgrid.api_key = Some(api_key);
        }

        if let Ok(upload_dir) = std::env::var("STUDYSYNC_UPLOAD_DIR") {
            self.resources.upload_dir = Some(PathBuf::from(upload_dir));
        }

        if let Ok(level) = std::env::var("STUDYSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("STUDYSYNC_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json_format = v,
                Err(_) => tracing::warn!("Invalid value for STUDYSYNC_JSON_LOGS: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(PathBuf::from(path));
        }
        if cli.json_logs {
            self.logging.json_format = true;
        }
        if cli.verbose {
            self.logging.level = "studysync=debug".to_string();
        }
    }

    /// Database path after applying defaults
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => crate::storage::default_database_path(),
        }
    }

    /// Upload directory after applying defaults
    pub fn upload_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.resources.upload_dir {
            return Ok(dir.clone());
        }
        let db_path = self.database_path()?;
        let base = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(base.join("uploads"))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_notifiers = ["log", "sendgrid"];
        if !valid_notifiers.contains(&self.notifications.provider.as_str()) {
            return Err(StudySyncError::Config(format!(
                "Invalid notification provider: {}. Must be one of: {}",
                self.notifications.provider,
                valid_notifiers.join(", ")
            ))
            .into());
        }

        if !self.notifications.from_address.contains('@') {
            return Err(StudySyncError::Config(format!(
                "notifications.from_address is not an email address: {}",
                self.notifications.from_address
            ))
            .into());
        }

        if self.notifications.provider == "sendgrid" {
            let has_key = self
                .notifications
                .sendgrid
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
            if !has_key {
                return Err(StudySyncError::Config(
                    "notifications.sendgrid.api_key is required for the sendgrid provider"
                        .to_string(),
                )
                .into());
            }
        }

        if self.resources.allowed_extensions.is_empty() {
            return Err(StudySyncError::Config(
                "resources.allowed_extensions must not be empty".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
