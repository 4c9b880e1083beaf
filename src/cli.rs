//! Command-line interface for ncmq.
//!
//! - `ncmq run <folder>` - convert every encrypted file in a folder
//! - `ncmq watch <folder>` - keep converting as new files appear
//! - `ncmq config` - show the resolved configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::warn;

use crate::config;
use crate::controller::RunController;
use crate::discover::scan_folder;
use crate::gateway::{self, Gateway};

/// ncmq - Conversion queue manager for NCM-encrypted audio files
#[derive(Parser, Debug)]
#[command(name = "ncmq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert every encrypted file in a folder, then exit
    Run {
        /// Folder containing encrypted audio files
        folder: PathBuf,

        /// Force the local simulation even when a backend is configured
        #[arg(long)]
        simulate: bool,

        /// Backend binary (or use NCMQ_BACKEND env)
        #[arg(long, env = "NCMQ_BACKEND")]
        backend: Option<PathBuf>,
    },

    /// Watch a folder and convert new files as they appear
    Watch {
        /// Folder to watch
        folder: PathBuf,

        /// Force the local simulation even when a backend is configured
        #[arg(long)]
        simulate: bool,

        /// Backend binary (or use NCMQ_BACKEND env)
        #[arg(long, env = "NCMQ_BACKEND")]
        backend: Option<PathBuf>,
    },

    /// Show the resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                folder,
                simulate,
                backend,
            } => execute_run(folder, simulate, backend).await,
            Commands::Watch {
                folder,
                simulate,
                backend,
            } => execute_watch(folder, simulate, backend).await,
            Commands::Config => execute_config(),
        }
    }
}

/// Resolve the gateway for this invocation. The choice is made once and
/// holds for the process lifetime.
fn resolve_gateway(
    simulate: bool,
    backend: Option<PathBuf>,
) -> Result<(Arc<dyn Gateway>, Vec<String>)> {
    let mut effective = config::config()?.clone();

    if let Some(backend) = backend {
        effective.backend_binary = Some(backend);
    }
    if simulate {
        effective.backend_binary = None;
    }

    let gateway = gateway::detect(&effective).context("Failed to initialize backend gateway")?;
    Ok((gateway, effective.extensions))
}

/// Convert a folder once and exit when the queue drains
async fn execute_run(folder: PathBuf, simulate: bool, backend: Option<PathBuf>) -> Result<()> {
    let (gateway, extensions) = resolve_gateway(simulate, backend)?;
    let mut progress_rx = gateway.subscribe_progress();
    let mut controller = RunController::new(gateway);

    let files = scan_folder(&folder, &extensions).await?;
    if files.is_empty() {
        println!("No encrypted audio files in {}", folder.display());
        return Ok(());
    }
    println!("📂 {} file(s) queued from {}", files.len(), folder.display());

    controller.set_folder(files);
    controller.start_batch().await;

    while controller.is_processing() {
        tokio::select! {
            event = progress_rx.recv() => match event {
                Ok(event) => controller.on_progress(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("🛑 Stopping (in-flight conversion is not cancelled)");
                controller.stop_batch();
                break;
            }
        }
    }

    print_summary(&controller);
    Ok(())
}

/// Watch a folder continuously until Ctrl+C
async fn execute_watch(folder: PathBuf, simulate: bool, backend: Option<PathBuf>) -> Result<()> {
    let (gateway, extensions) = resolve_gateway(simulate, backend)?;
    let mut progress_rx = gateway.subscribe_progress();
    let mut discovery_rx = gateway.subscribe_discovery();
    let mut controller = RunController::new(gateway);

    // Pick up what is already there before watching for new arrivals
    let files = scan_folder(&folder, &extensions).await?;
    if !files.is_empty() {
        println!("📥 Initial scan: {} file(s) queued", files.len());
    }
    controller.set_folder(files);

    controller
        .toggle_watch(&folder)
        .await
        .context("Failed to start folder watch")?;
    println!("👁️  Watching {} (Ctrl+C to stop)", folder.display());

    loop {
        tokio::select! {
            event = progress_rx.recv() => match event {
                Ok(event) => controller.on_progress(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            file = discovery_rx.recv() => match file {
                Ok(file) => {
                    println!("📥 New file: {}", file.name);
                    controller.on_discovery(file).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "discovery subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("🛑 Stopping watch...");
                if let Err(e) = controller.toggle_watch(&folder).await {
                    warn!(error = %e, "failed to stop folder watch");
                }
                controller.stop_batch();
                break;
            }
        }
    }

    print_summary(&controller);
    Ok(())
}

/// Show the resolved configuration
fn execute_config() -> Result<()> {
    let cfg = config::config()?;

    println!();
    println!("ncmq configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!(
        "Config file:  {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!(
        "Backend:      {}",
        cfg.backend_binary
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(local simulation)".to_string())
    );
    println!("Extensions:   {:?}", cfg.extensions);
    println!("Sim delay:    {} ms", cfg.simulate_delay.as_millis());
    println!();

    Ok(())
}

/// Final per-item table plus aggregate counts
fn print_summary(controller: &RunController) {
    let stats = controller.stats();

    println!();
    println!("{:<12} {:<40} {:>5}", "STATUS", "FILE", "PCT");
    println!("{}", "-".repeat(60));

    for item in controller.items() {
        println!(
            "{:<12} {:<40} {:>4}%",
            item.status.to_string(),
            truncate(&item.name, 38),
            item.progress
        );
        if let Some(error) = &item.error {
            println!("{:<12}   ↳ {}", "", error);
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "✅ {} completed   ❌ {} failed   ({} total)",
        stats.completed, stats.failed, stats.total
    );
}

/// Shorten long file names without splitting multi-byte characters
fn truncate(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }

    let cut: String = name.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
