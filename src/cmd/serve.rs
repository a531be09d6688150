//! `kanban init` and `kanban serve`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use kanban::config::{CONFIG_FILE, KANBAN_DIR, KanbanConfig};
use tracing::info;

use super::open_db;

pub fn cmd_init(config: &KanbanConfig, config_path: Option<&Path>) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(KANBAN_DIR).join(CONFIG_FILE));

    if config_path.exists() {
        println!("Config already present at {}", config_path.display());
    } else {
        if let Some(parent) = config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        KanbanConfig::default().save(&config_path)?;
        println!("Wrote default config to {}", config_path.display());
    }

    open_db(config)?;
    info!(db = %config.database.path.display(), "database initialized");
    println!(
        "Initialized kanban database at {}",
        config.database.path.display()
    );
    Ok(())
}

pub async fn cmd_serve(
    config: KanbanConfig,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
) -> Result<()> {
    let mut server_config = config.server_config();
    if let Some(port) = port {
        server_config.port = port;
    }
    if let Some(host) = host {
        server_config.host = host;
    }
    server_config.dev_mode |= dev;

    kanban::board::server::start_server(server_config).await
}
