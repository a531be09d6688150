use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "kanban")]
#[command(version, about = "Multi-project kanban board with ordered columns and task history")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to kanban.toml. Defaults to .kanban/kanban.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path. Overrides kanban.toml and KANBAN_DB_PATH.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .kanban directory, a default kanban.toml and the database
    Init,
    /// Serve the JSON API and change feed
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Permissive CORS for a separately served frontend
        #[arg(long)]
        dev: bool,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Inspect boards
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProjectCommands {
    /// Create a project
    Add { name: String },
    /// List visible projects
    List,
    /// Soft-delete a project
    Delete { id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum BoardCommands {
    /// Print a project's board as JSON, creating it on first access
    Show { project_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    kanban::logging::init_tracing(cli.verbose);

    // `init` is what creates a missing config file.
    let allow_missing = matches!(cli.command, Commands::Init);
    let config = cmd::resolve_config(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        allow_missing,
    )?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config, cli.config.as_deref())?,
        Commands::Serve { port, host, dev } => {
            cmd::cmd_serve(config, *port, host.clone(), *dev).await?
        }
        Commands::Project { command } => cmd::cmd_project(&config, command.clone())?,
        Commands::Board { command } => cmd::cmd_board(&config, command.clone())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from(["kanban", "serve", "--port", "9000", "--dev"]).unwrap();
        match cli.command {
            Commands::Serve { port, host, dev } => {
                assert_eq!(port, Some(9000));
                assert_eq!(host, None);
                assert!(dev);
            }
            _ => panic!("Expected Serve"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kanban", "project", "list", "--db-path", "x.db", "-v"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.db_path, Some(PathBuf::from("x.db")));
    }

    #[test]
    fn test_project_delete_requires_numeric_id() {
        assert!(Cli::try_parse_from(["kanban", "project", "delete", "abc"]).is_err());
    }
}
