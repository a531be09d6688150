//! `kanban board show`.

use anyhow::{Context, Result};
use kanban::config::KanbanConfig;

use super::open_db;
use crate::BoardCommands;

pub fn cmd_board(config: &KanbanConfig, command: BoardCommands) -> Result<()> {
    let db = open_db(config)?;

    match command {
        BoardCommands::Show { project_id } => {
            let view = db
                .board_view(project_id)
                .with_context(|| format!("Failed to load board for project {}", project_id))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}
