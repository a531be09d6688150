//! CLI command implementations.
//!
//! | Module    | Commands handled            |
//! |-----------|-----------------------------|
//! | `serve`   | `Init`, `Serve`             |
//! | `project` | `Project`                   |
//! | `board`   | `Board`                     |

pub mod board;
pub mod project;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use kanban::board::db::BoardDb;
use kanban::config::{KANBAN_DIR, KanbanConfig};

pub use board::cmd_board;
pub use project::cmd_project;
pub use serve::{cmd_init, cmd_serve};

/// Build the effective configuration: file, then `.env` and process
/// environment, then CLI flags.
///
/// An explicit `config_path` must exist unless `allow_missing` is set, in
/// which case a missing file falls back to the defaults.
pub fn resolve_config(
    config_path: Option<&Path>,
    db_path: Option<&Path>,
    allow_missing: bool,
) -> Result<KanbanConfig> {
    let mut config = match config_path {
        Some(path) if allow_missing && !path.exists() => KanbanConfig::default(),
        Some(path) => KanbanConfig::load(path)?,
        None => KanbanConfig::load_or_default(Path::new(KANBAN_DIR))?,
    };

    let _ = dotenvy::dotenv();
    config.apply_env()?;

    if let Some(path) = db_path {
        config.database.path = path.to_path_buf();
    }
    config.ensure_valid()?;
    Ok(config)
}

/// Open the configured database, creating its directory if needed.
pub fn open_db(config: &KanbanConfig) -> Result<BoardDb> {
    let path = &config.database.path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    BoardDb::open(path, config.db_settings())
        .with_context(|| format!("Failed to open board database at {}", path.display()))
}
