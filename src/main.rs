//! # Sigil: event-driven command server
//!
//! Usage:
//!   sigil serve                        # Read JSON interactions from stdin
//!   sigil definitions                  # Print command definitions as JSON
//!   sigil --config ./sigil.toml serve  # Custom config file

mod commands;
mod console;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use clap::{Parser, Subcommand};
use sigil_commands::{
    AuthorizationGate, Dispatched, Dispatcher, FileRoleSource, Registry, RegistryBuilder,
};
use sigil_core::config::SigilConfig;
use sigil_core::{Interaction, Platform};
use sigil_scheduler::{ScheduleStore, Scheduler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::commands::SchedulerSlot;
use crate::console::{ConsolePlatform, ConsoleResponder};

#[derive(Parser)]
#[command(name = "sigil", version, about = "🔰 Sigil: event-driven command server")]
struct Cli {
    /// Config file (default: ~/.sigil/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch newline-delimited JSON interactions read from stdin
    Serve,
    /// Print the registered command definitions
    Definitions,
}

fn load_config(path: Option<&str>) -> Result<SigilConfig> {
    let config = match path {
        Some(p) => SigilConfig::load_from(&PathBuf::from(shellexpand::tilde(p).to_string()))?,
        None => SigilConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the console protocol.
    let filter = if cli.verbose { "sigil=debug" } else { "sigil=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    let slot: SchedulerSlot = Arc::new(OnceLock::new());
    let registry = commands::register(RegistryBuilder::new(), &slot)
        .allow_only(config.allowed_commands.iter().cloned())
        .build()?;
    let registry = Registry::install_global(registry)?;

    match cli.command {
        Command::Definitions => {
            println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
            Ok(())
        }
        Command::Serve => serve(config, registry, slot).await,
    }
}

async fn serve(config: SigilConfig, registry: Arc<Registry>, slot: SchedulerSlot) -> Result<()> {
    let platform = Arc::new(ConsolePlatform::new());
    let gate = AuthorizationGate::new(Arc::new(FileRoleSource::new(config.access_file())));
    let dispatcher = Dispatcher::new(registry, gate);

    let scheduler = Scheduler::new(
        ScheduleStore::new(config.schedule_file()),
        dispatcher.clone(),
        platform.clone() as Arc<dyn Platform>,
    );
    if slot.set(scheduler.clone()).is_err() {
        anyhow::bail!("scheduler already initialized");
    }
    scheduler.start().await;

    tracing::info!("🚀 Sigil ready, reading interactions from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut actions = Vec::new();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let interaction: Interaction = match serde_json::from_str(&line) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!("⚠️ Skipping malformed interaction: {e}");
                continue;
            }
        };
        let responder = Arc::new(ConsoleResponder::new(platform.clone(), interaction.channel_id));
        match dispatcher.dispatch(interaction, responder).await {
            Dispatched::Spawned(handle) => actions.push(handle),
            outcome => tracing::debug!("Interaction finished: {outcome:?}"),
        }
        actions.retain(|h| !h.is_finished());
    }

    for handle in actions {
        if let Err(e) = handle.await {
            tracing::warn!("⚠️ Action task failed: {e}");
        }
    }
    scheduler.shutdown().await;
    Ok(())
}
