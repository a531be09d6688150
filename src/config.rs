//! Configuration for the kanban board, read from `.kanban/kanban.toml`.
//!
//! Layering is file → environment → CLI: [`KanbanConfig::load_or_default`]
//! reads the file (or falls back to defaults), [`KanbanConfig::apply_env`]
//! applies `KANBAN_*` variables, and the CLI overwrites individual fields
//! last.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! dev_mode = false
//!
//! [database]
//! path = ".kanban/kanban.db"
//! busy_timeout_ms = 5000
//! max_attempts = 3
//! retry_backoff_ms = 25
//!
//! [board]
//! default_columns = ["To Do", "In Progress", "Done"]
//! default_tag_color = "#3b82f6"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::board::db::DbSettings;
use crate::board::models::DEFAULT_TAG_COLOR;
use crate::board::server::ServerConfig;

/// Directory holding the config file and, by default, the database.
pub const KANBAN_DIR: &str = ".kanban";
pub const CONFIG_FILE: &str = "kanban.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a separately served frontend.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Total tries per mutation before it fails with a conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(KANBAN_DIR).join("kanban.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    25
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardSection {
    /// Columns a board starts with, in order.
    #[serde(default = "default_columns")]
    pub default_columns: Vec<String>,
    #[serde(default = "default_tag_color")]
    pub default_tag_color: String,
}

fn default_columns() -> Vec<String> {
    vec![
        "To Do".to_string(),
        "In Progress".to_string(),
        "Done".to_string(),
    ]
}

fn default_tag_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            default_columns: default_columns(),
            default_tag_color: default_tag_color(),
        }
    }
}

/// The complete kanban.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KanbanConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub board: BoardSection,
}

impl KanbanConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse kanban.toml")
    }

    /// Load `kanban.toml` from `kanban_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(kanban_dir: &Path) -> Result<Self> {
        let config_path = kanban_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize kanban.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `KANBAN_DB_PATH`, `KANBAN_HOST` and `KANBAN_PORT` from the
    /// process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("KANBAN_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(host) = lookup("KANBAN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("KANBAN_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid KANBAN_PORT '{}'", port))?;
        }
        Ok(())
    }

    /// Problems that make this configuration unusable. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.board.default_columns.is_empty() {
            errors.push("board.default_columns must name at least one column".to_string());
        }
        if self
            .board
            .default_columns
            .iter()
            .any(|name| name.trim().is_empty())
        {
            errors.push("board.default_columns must not contain blank names".to_string());
        }
        if self.board.default_tag_color.trim().is_empty() {
            errors.push("board.default_tag_color must not be empty".to_string());
        }
        if self.database.max_attempts == 0 {
            errors.push("database.max_attempts must be at least 1".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            errors.push("database.path must not be empty".to_string());
        }

        errors
    }

    /// Fail with every validation problem listed.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if !errors.is_empty() {
            bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }
        Ok(())
    }

    pub fn db_settings(&self) -> DbSettings {
        DbSettings {
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            max_attempts: self.database.max_attempts,
            retry_backoff: Duration::from_millis(self.database.retry_backoff_ms),
            default_columns: self.board.default_columns.clone(),
            default_tag_color: self.board.default_tag_color.clone(),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            db_path: self.database.path.clone(),
            db_settings: self.db_settings(),
            dev_mode: self.server.dev_mode,
        }
    }
}
