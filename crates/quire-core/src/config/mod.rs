//! Configuration system for quire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{QuireError, QuireResult};

/// An external program invoked with JSON on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to run.
    pub program: String,
    /// Extra arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// External mail collaborator commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Search command, receives `{query, max_results}`.
    pub search: CommandSpec,
    /// Read command, receives `{email_id}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<CommandSpec>,
}

/// Main store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory holding every document.
    pub data_dir: PathBuf,
    /// Campaign folder, relative to `data_dir`.
    pub campaigns_dir: String,
    /// Prospect folder, relative to `data_dir`.
    pub prospects_dir: String,
    /// Life memory folder, relative to `data_dir`.
    pub life_dir: String,
    /// Runtime state folder (approval queue, processed replies).
    pub state_dir: String,
    /// Days before a queued action expires.
    pub approval_ttl_days: i64,
    /// Maximum campaign log entries kept.
    pub log_capacity: usize,
    /// Maximum approval history entries kept.
    pub history_capacity: usize,
    /// Maximum processed reply ids remembered.
    pub processed_reply_capacity: usize,
    /// Timeout for a single external send, in seconds.
    pub sender_timeout_secs: u64,
    /// Sender programs keyed by channel (`email`, `sms`, `linkedin`).
    pub senders: BTreeMap<String, CommandSpec>,
    /// Mail collaborator used by reply processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".quire"))
            .unwrap_or_else(|| PathBuf::from(".quire"));

        Self {
            data_dir,
            campaigns_dir: "campaigns".to_string(),
            prospects_dir: "prospects".to_string(),
            life_dir: "life".to_string(),
            state_dir: "state".to_string(),
            approval_ttl_days: 3,
            log_capacity: 1000,
            history_capacity: 500,
            processed_reply_capacity: 1000,
            sender_timeout_secs: 60,
            senders: BTreeMap::new(),
            mail: None,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn campaigns_path(&self) -> PathBuf {
        self.data_dir.join(&self.campaigns_dir)
    }

    pub fn prospects_path(&self) -> PathBuf {
        self.data_dir.join(&self.prospects_dir)
    }

    pub fn life_path(&self) -> PathBuf {
        self.data_dir.join(&self.life_dir)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_dir)
    }

    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> QuireResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| QuireError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| QuireError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| QuireError::Configuration(e.to_string())),
            _ => Err(QuireError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("QUIRE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(days) = std::env::var("QUIRE_APPROVAL_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.approval_ttl_days = days;
        }
        if let Some(secs) = std::env::var("QUIRE_SENDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.sender_timeout_secs = secs;
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for StoreConfig.
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the approval expiry in days.
    pub fn approval_ttl_days(mut self, days: i64) -> Self {
        self.config.approval_ttl_days = days;
        self
    }

    /// Set the campaign log capacity.
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.config.log_capacity = capacity;
        self
    }

    /// Set the approval history capacity.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Set the external send timeout.
    pub fn sender_timeout_secs(mut self, secs: u64) -> Self {
        self.config.sender_timeout_secs = secs;
        self
    }

    /// Register a sender program for a channel.
    pub fn sender(mut self, channel: impl Into<String>, command: CommandSpec) -> Self {
        self.config.senders.insert(channel.into(), command);
        self
    }

    /// Set the mail collaborator.
    pub fn mail(mut self, mail: MailConfig) -> Self {
        self.config.mail = Some(mail);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> StoreConfig {
        self.config
    }
}
