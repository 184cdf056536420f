//! Environment-side configuration service.
//!
//! Serves the sync engine over stdin/stdout using length-prefixed frames,
//! so a simulator can launch it as a child process and a controller can
//! talk to it through the simulator's side channel.
//!
//! # Startup
//! ```text
//! settings → logging → metrics → schema → engine
//!     → overrides (optional, optionally watched)
//!     → ConfigServer over stdio until EOF or SIGTERM/SIGINT
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use env_config_sync::config::{self, OverridesWatcher, ServiceConfig};
use env_config_sync::engine::{spawn_overrides_reloader, ConfigServer, SyncEngine};
use env_config_sync::lifecycle::{signals, Shutdown};
use env_config_sync::observability::{logging, metrics};
use env_config_sync::transport::{SideChannel, StreamChannel};

#[derive(Parser)]
#[command(name = "env-config-sync")]
#[command(about = "Serve environment configuration over a stdio side channel", long_about = None)]
struct Cli {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides file, replacing `overrides.path` from the settings.
    #[arg(short, long)]
    overrides: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(path) = cli.overrides {
        settings.overrides.path = Some(path);
    }

    logging::init_tracing(&settings.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "env-config-sync starting");

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let schema = Arc::new(config::load_schema(&settings.schema)?);
    let engine = Arc::new(SyncEngine::new(Arc::clone(&schema)));

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_signal_handler(shutdown.clone());

    // Keeps the file watcher alive for the lifetime of the server.
    let mut _watcher = None;
    if let Some(path) = &settings.overrides.path {
        let overrides = config::load_overrides(path, &schema)?;
        engine.apply_overrides(&overrides)?;

        if settings.overrides.watch {
            let (watcher, updates) = OverridesWatcher::new(path, Arc::clone(&schema));
            _watcher = Some(watcher.run()?);

            spawn_overrides_reloader(Arc::clone(&engine), updates, shutdown.clone());
        }
    }

    let channel: Arc<dyn SideChannel> = Arc::new(StreamChannel::new(
        tokio::io::stdin(),
        tokio::io::stdout(),
        settings.transport.max_frame_bytes,
    ));
    let server = ConfigServer::new(engine, channel);
    let result = server.run(shutdown.subscribe()).await;
    shutdown.trigger();

    result?;
    tracing::info!("Shutdown complete");
    // A pending blocking stdin read would otherwise hold the runtime open.
    std::process::exit(0)
}
