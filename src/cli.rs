//! CLI module for Zapgate
//!
//! - `serve`: Run the orchestrator (default)
//! - `sessions`: List persisted sessions that would be restored

use crate::server::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::Path;
use zapgate_whatsapp::auth;

/// Zapgate WhatsApp session orchestrator
#[derive(Parser, Debug)]
#[command(name = "zapgate")]
#[command(about = "Multi-tenant WhatsApp session orchestrator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// List persisted sessions with valid credentials
    Sessions,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Sessions) => list_sessions(&config).await,
        Some(Commands::Serve) | None => crate::server::run(config).await,
    }
}

async fn list_sessions(config: &AppConfig) -> anyhow::Result<()> {
    let base = Path::new(&config.whatsapp.auth_base_dir);
    let sessions = auth::detect_sessions(base).await?;

    if sessions.is_empty() {
        println!("No persisted sessions under {}", base.display());
        return Ok(());
    }

    println!("{} persisted session(s) under {}:", sessions.len(), base.display());
    for session_id in sessions {
        println!("  {session_id}");
    }
    Ok(())
}
