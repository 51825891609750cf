//! # Configuration
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. An optional TOML file (`--config` or `MANA_CONFIG`)
//! 2. Environment overrides: `MANA_API_KEY`, `MANA_RATE_LIMIT`,
//!    `MANA_CORS_ORIGINS`
//! 3. Command-line flags
//!
//! ```toml
//! [storage]
//! backend = "redb"        # or "file"
//! path = "mana.db"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100        # requests per second, 0 disables
//! cors_origins = ["http://localhost:3000"]
//!
//! [workshops]
//! stages = 5              # 1..=6
//! ```

use mana_core::{ManaError, Workspace, WorkshopSequence};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// redb database, durable on every commit.
    #[default]
    Redb,
    /// In-memory store saved as a snapshot file after each change.
    File,
}

impl Backend {
    pub fn parse(token: &str) -> Result<Self, ManaError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "file" => Ok(Self::File),
            other => Err(ManaError::InvalidInput(format!(
                "unknown backend '{}' (expected redb or file)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: Backend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Redb,
            path: PathBuf::from("mana.db"),
        }
    }
}

impl StorageConfig {
    /// Open the workspace this configuration describes.
    pub fn open(&self, sequence: WorkshopSequence) -> Result<Workspace, ManaError> {
        match self.backend {
            Backend::Redb => Workspace::with_redb(&self.path, sequence),
            Backend::File => Workspace::from_snapshot_file(&self.path, sequence),
        }
    }

    /// Persist a file-backed workspace. A no-op for redb.
    pub fn persist(&self, workspace: &Workspace) -> Result<(), ManaError> {
        if workspace.is_persistent() {
            return Ok(());
        }
        workspace.save_snapshot(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer key required on every endpoint except `/health`.
    pub api_key: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Allowed origins; `["*"]` allows all, unset means localhost only.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkshopConfig {
    /// Number of stages in the sequence.
    pub stages: usize,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            stages: mana_core::primitives::DEFAULT_SEQUENCE_LEN,
        }
    }
}

impl WorkshopConfig {
    pub fn sequence(&self) -> WorkshopSequence {
        WorkshopSequence::with_len(self.stages)
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManaConfig {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub workshops: WorkshopConfig,
}

impl ManaConfig {
    /// Load the file (when given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ManaError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ManaError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ManaError::Io(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ManaError> {
        toml::from_str(contents).map_err(|e| ManaError::InvalidInput(format!("config: {}", e)))
    }

    /// Apply `MANA_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("MANA_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(limit) = lookup("MANA_RATE_LIMIT").and_then(|s| s.trim().parse().ok()) {
            self.server.rate_limit = limit;
        }
        if let Some(origins) = lookup("MANA_CORS_ORIGINS") {
            self.server.cors_origins = Some(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        // An empty key disables authentication.
        if self.server.api_key.as_deref().is_some_and(str::is_empty) {
            self.server.api_key = None;
        }
    }

    pub fn validate(&self) -> Result<(), ManaError> {
        if !(1..=6).contains(&self.workshops.stages) {
            return Err(ManaError::InvalidInput(format!(
                "workshops.stages must be between 1 and 6, got {}",
                self.workshops.stages
            )));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(ManaError::InvalidInput(
                "storage.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
