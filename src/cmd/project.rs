//! `kanban project add|list|delete`.

use anyhow::{Context, Result};
use kanban::config::KanbanConfig;

use super::open_db;
use crate::ProjectCommands;

pub fn cmd_project(config: &KanbanConfig, command: ProjectCommands) -> Result<()> {
    let db = open_db(config)?;

    match command {
        ProjectCommands::Add { name } => {
            let project = db
                .create_project(&name)
                .with_context(|| format!("Failed to create project '{}'", name))?;
            println!("Created project {} ({})", project.id, project.name);
        }
        ProjectCommands::List => {
            let projects = db.list_projects()?;
            if projects.is_empty() {
                println!("No projects.");
            }
            for project in projects {
                println!("{}\t{}", project.id, project.name);
            }
        }
        ProjectCommands::Delete { id } => {
            db.delete_project(id)
                .with_context(|| format!("Failed to delete project {}", id))?;
            println!("Deleted project {}", id);
        }
    }
    Ok(())
}
