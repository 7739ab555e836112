//! Command-line driver for the plugin host: discovers plugin files under a
//! directory, loads them, and pumps simulated vsyncs against the scheduler
//! so its handshake can be watched end-to-end without a real emulator.

mod facade;
mod observer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plugin_host_manager::{DockState, ManagerConfig, PluginManager};

use crate::facade::DemoEmulator;
use crate::observer::TracingObserver;

#[derive(Parser)]
#[command(name = "plugin-host-demo")]
#[command(about = "Exercises the emulator plugin host from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List plugin files discovered under a directory (spec §6).
    List {
        /// Directory to search, recursively, for `plugin_*` shared libraries.
        plugins_dir: PathBuf,
    },
    /// Load every discovered plugin and pump simulated vsyncs against it.
    Run {
        /// Directory to search for plugin libraries.
        plugins_dir: PathBuf,
        /// Number of simulated vsyncs to fire.
        #[arg(long, default_value_t = 120)]
        vsyncs: u32,
        /// Power the simulated guest on before the first vsync.
        #[arg(long)]
        boot: bool,
        /// Unload every plugin partway through the run, to exercise the
        /// teardown pipeline (spec §8, scenario 3).
        #[arg(long)]
        unload_midway: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "plugin_host_demo=info".to_owned()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List { plugins_dir } => list(&plugins_dir),
        Commands::Run {
            plugins_dir,
            vsyncs,
            boot,
            unload_midway,
        } => run(&plugins_dir, vsyncs, boot, unload_midway),
    }
}

fn list(plugins_dir: &std::path::Path) -> Result<()> {
    let found = plugin_host_manager::discover_plugin_files(plugins_dir);
    if found.is_empty() {
        println!("no plugin_* libraries found under {}", plugins_dir.display());
    }
    for path in found {
        println!("{}", path.display());
    }
    Ok(())
}

fn run(plugins_dir: &std::path::Path, vsyncs: u32, boot: bool, unload_midway: bool) -> Result<()> {
    let system = DemoEmulator::new(boot);
    let config = ManagerConfig::fast_pacing(plugins_dir.to_path_buf());
    let manager = PluginManager::new(
        config,
        Arc::clone(&system) as Arc<dyn plugin_host_core::facade::EmulatorFacade>,
        Some(Arc::new(TracingObserver)),
        DockState::Docked { width: 1280, height: 720 },
    );
    manager.set_list_changed_callback(|| tracing::info!("loaded-plugin set changed"));

    let candidates = manager.discover();
    if candidates.is_empty() {
        println!("no plugin_* libraries found under {}", plugins_dir.display());
        return Ok(());
    }
    for path in &candidates {
        match manager.load(path) {
            Ok(()) => tracing::info!(path = %path.display(), "loaded"),
            Err(err) => tracing::error!(path = %path.display(), %err, "failed to load"),
        }
    }

    manager.set_active(true);

    for tick in 0..vsyncs {
        if unload_midway && tick == vsyncs / 2 {
            for path in manager.list() {
                manager.remove(&path).context("removing a path we just listed")?;
            }
            tracing::info!("requested unload of every loaded plugin");
        }
        system.on_vsync();
        manager.on_vsync();
        std::thread::sleep(Duration::from_millis(16));
    }

    println!("still loaded: {:?}", manager.list());
    if let Some(last_error) = manager.last_error() {
        println!("last error: {last_error}");
    }
    Ok(())
}
