//! Mesh coordinator daemon.
//!
//! ```text
//!   seeds (config) ──register──▶ ┌──────────────────────────────────────────┐
//!                                │              MESH COORDINATOR            │
//!                                │                                          │
//!                                │  ┌──────────┐   probe   ┌─────────────┐  │
//!                                │  │  health  │──────────▶│   prober    │──┼──▶ service endpoints
//!                                │  │ monitor  │           │   (TCP)     │  │
//!                                │  └────┬─────┘           └─────────────┘  │
//!                                │       │ status                           │
//!                                │       ▼                                  │
//!                                │  ┌──────────┐  select   ┌─────────────┐  │
//!                                │  │ registry │◀──────────│    load     │  │
//!                                │  │  store   │           │  balancer   │  │
//!                                │  └──────────┘           └──────┬──────┘  │
//!                                │                                │ report  │
//!                                │                         ┌──────▼──────┐  │
//!                                │                         │  circuit    │  │
//!                                │                         │  breakers   │  │
//!                                │                         └─────────────┘  │
//!                                └──────────────────────────────────────────┘
//! ```
//!
//! The daemon registers the configured seeds, monitors them, hot-reloads the
//! health and load balancer defaults on file change or SIGHUP, and stops on
//! SIGINT/SIGTERM.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mesh_coordinator::config::loader::load_config;
use mesh_coordinator::config::watcher::ConfigWatcher;
use mesh_coordinator::config::MeshConfig;
use mesh_coordinator::coordinator::MeshCoordinator;
use mesh_coordinator::health::TcpProber;
use mesh_coordinator::lifecycle::shutdown::triggered;
use mesh_coordinator::lifecycle::{bootstrap, signals, Shutdown, Signal};
use mesh_coordinator::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "mesh-coordinator", version, about = "Service mesh coordinator daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "mesh.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        MeshConfig::default()
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "mesh-coordinator starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let coordinator = Arc::new(bootstrap(&config, Arc::new(TcpProber::new()))?);
    let shutdown = Shutdown::new();

    // Hot reload: keep the watcher alive for the lifetime of the daemon.
    let (watcher, mut updates) = ConfigWatcher::new(&args.config);
    let _watcher = if args.config.exists() {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let reload_task = {
        let coordinator = coordinator.clone();
        let stop = shutdown.subscribe();
        tokio::spawn(async move {
            let stopped = triggered(stop);
            tokio::pin!(stopped);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    update = updates.recv() => match update {
                        Some(new_config) => apply_defaults(&coordinator, new_config),
                        None => break,
                    },
                }
            }
        })
    };

    loop {
        match signals::next_signal().await? {
            Signal::Shutdown => break,
            Signal::Reload => reload(&coordinator, &args.config),
        }
    }

    tracing::info!("Shutdown signal received");
    shutdown.trigger();
    let _ = reload_task.await;
    coordinator.stop()?;

    let stats = coordinator.stats();
    tracing::info!(
        services = stats.total_services,
        requests = stats.total_requests,
        uptime_secs = stats.uptime.as_secs(),
        "Shutdown complete"
    );
    Ok(())
}

fn reload(coordinator: &MeshCoordinator, path: &Path) {
    match load_config(path) {
        Ok(config) => apply_defaults(coordinator, config),
        Err(e) => tracing::error!(path = ?path, error = %e, "Config reload rejected"),
    }
}

fn apply_defaults(coordinator: &MeshCoordinator, config: MeshConfig) {
    if let Err(e) = coordinator.configure(Some(config.health_check), Some(config.load_balancer)) {
        tracing::error!(error = %e, "Failed to apply reloaded defaults");
    }
}
