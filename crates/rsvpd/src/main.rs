//! rsvpd: the room reservation scheduling daemon
//!
//! Hosts the persistent store and the stale-pending reaper. Transports
//! (HTTP, IPC) sit in front of the scheduling engine and are out of scope
//! here; the daemon provides the long-running process around the store
//! and the background sweep.

use anyhow::{Context, Result};
use clap::Parser;
use rsvp_config::{ReaperSettings, Settings};
use rsvp_core::Reaper;
use rsvp_store::{AuditKind, AuditRecord, SqliteStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rsvpd", version, about = "Room reservation scheduling daemon")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value_os_t = rsvp_util::default_config_path())]
    config: PathBuf,

    /// Override the data directory
    #[arg(long, env = rsvp_util::RSVP_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Service {
    store: Arc<SqliteStore>,
    reaper_settings: ReaperSettings,
}

impl Service {
    fn new(settings: &Settings) -> Result<Self> {
        let data_dir = &settings.service.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let db_path = data_dir.join("rsvpd.db");
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("opening store at {}", db_path.display()))?;
        info!(path = %db_path.display(), "Store opened");

        Ok(Self {
            store: Arc::new(store),
            reaper_settings: settings.reaper,
        })
    }

    async fn run(self) -> Result<()> {
        let _ = self
            .store
            .append_audit(AuditRecord::new(AuditKind::ServiceStarted));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper = Reaper::new(
            self.store.clone() as Arc<dyn Store>,
            self.reaper_settings,
        );
        let reaper_handle = tokio::spawn(reaper.run(shutdown_rx));

        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down"),
        }

        let _ = shutdown_tx.send(true);
        if let Err(e) = reaper_handle.await {
            warn!(error = %e, "Reaper task ended abnormally");
        }

        let _ = self
            .store
            .append_audit(AuditRecord::new(AuditKind::ServiceStopped));
        info!("Service stopped");

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "rsvpd starting");

    let mut settings = if args.config.exists() {
        let settings = rsvp_config::load_config(&args.config)
            .with_context(|| format!("loading configuration from {}", args.config.display()))?;
        info!(path = %args.config.display(), "Configuration loaded");
        settings
    } else {
        info!(path = %args.config.display(), "No configuration file found, using defaults");
        Settings::default()
    };

    if let Some(data_dir) = args.data_dir {
        settings.service.data_dir = data_dir;
    }

    let service = Service::new(&settings)?;
    service.run().await
}
