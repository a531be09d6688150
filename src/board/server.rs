use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState};
use super::db::{BoardDb, DbHandle, DbSettings};
use super::events;

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_settings: DbSettings,
    /// Enables permissive CORS for a separately served frontend.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3142,
            db_path: PathBuf::from(".kanban/kanban.db"),
            db_settings: DbSettings::default(),
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(events::ws_handler))
        .with_state(state)
}

/// Open the database at `config.db_path`, creating its directory if needed.
pub fn open_database(config: &ServerConfig) -> Result<BoardDb> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    BoardDb::open(&config.db_path, config.db_settings.clone()).with_context(|| {
        format!(
            "Failed to initialize board database at {}",
            config.db_path.display()
        )
    })
}

pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = open_database(&config)?;
    let state = Arc::new(AppState::new(DbHandle::new(db)));

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr: SocketAddr = listener.local_addr()?;
    info!(%local_addr, db = %config.db_path.display(), dev_mode = config.dev_mode, "board server listening");
    println!("Kanban board API running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
