//! # Monitor-Sense: MSI monitor control center TUI
//!
//! Terminal UI for MSI gaming monitors, driven through the `msigd` CLI.
//! Settings come from the local cache first and are refreshed from the
//! monitor on demand.
//!
//! ## Usage
//!   monitor-sense                 # Launch TUI
//!   monitor-sense --list          # Print connected monitors as JSON
//!   monitor-sense --restore-led   # Re-apply cached LED state and exit (for systemd)
//!
//! ## Dependencies
//!   msigd                         # https://github.com/couriersud/msigd

mod app;
mod ui;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hardware::executor::DEFAULT_BINARY;
use hardware::{MsigdExecutor, MsigdTransport, Transport};
use monitor_sense::directory::MonitorDirectory;
use monitor_sense::persisted::load_persisted_state;
use monitor_sense::store::{APP_DIR, JsonStore, SharedStore, default_store_path};
use shared::Command;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::app::App;

const LOG_FILE: &str = "monitor-sense.log";

#[derive(Parser, Debug)]
#[command(name = "monitor-sense", version, about = "MSI monitor control center")]
struct Cli {
    /// Settings file [default: <config dir>/monitor-sense/settings.json]
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// msigd executable
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BINARY)]
    msigd: PathBuf,

    /// Give up on a single msigd call after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Log destination [default: <config dir>/monitor-sense/monitor-sense.log in TUI mode, stderr otherwise]
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print connected monitors as JSON and exit
    #[arg(long, conflicts_with = "restore_led")]
    list: bool,

    /// Re-apply cached LED state to every connected monitor and exit
    #[arg(long)]
    restore_led: bool,
}

impl Cli {
    fn headless(&self) -> bool {
        self.list || self.restore_led
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Logging
// ═══════════════════════════════════════════════════════════════════════════════

fn log_level() -> Level {
    match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn default_log_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(LOG_FILE);
    path
}

/// The TUI owns the terminal, so it logs to a file; headless modes log to stderr.
fn init_logging(log_file: Option<PathBuf>) -> Result<()> {
    let builder = FmtSubscriber::builder().with_max_level(log_level());

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating log directory {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let subscriber = builder.with_ansi(false).with_writer(Mutex::new(file)).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Entrypoint
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match (&cli.log_file, cli.headless()) {
        (Some(path), _) => Some(path.clone()),
        (None, false) => Some(default_log_path()),
        (None, true) => None,
    };
    init_logging(log_file)?;

    let executor = MsigdExecutor::new(cli.msigd.clone())
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let transport = Arc::new(MsigdTransport::new(executor));

    if cli.list {
        return list_monitors(transport).await;
    }

    let store_path = cli.store.clone().unwrap_or_else(default_store_path);
    let store = JsonStore::open(&store_path).await.shared();
    info!(
        store = %store_path.display(),
        msigd = %cli.msigd.display(),
        "monitor-sense starting"
    );

    // --restore-led: headless mode for systemd / boot
    if cli.restore_led {
        return restore_led(transport, store).await;
    }

    let terminal = ratatui::init();
    let result = App::new(transport, store).run(terminal).await;
    ratatui::restore();
    result
}

/// Headless: print the connected monitors as JSON.
async fn list_monitors(transport: Arc<MsigdTransport>) -> Result<()> {
    let monitors = MonitorDirectory::new(transport)
        .list()
        .await
        .context("could not enumerate monitors")?;
    println!("{}", serde_json::to_string_pretty(&monitors)?);
    Ok(())
}

/// Headless: push the cached LED state back to every connected monitor.
/// Monitors forget it on power loss and cannot report it.
async fn restore_led(transport: Arc<MsigdTransport>, store: SharedStore) -> Result<()> {
    let persisted = load_persisted_state(&store).await;
    let monitors = MonitorDirectory::new(transport.clone())
        .list()
        .await
        .context("could not enumerate monitors")?;

    if monitors.is_empty() {
        warn!("no monitors connected, nothing to restore");
        return Ok(());
    }

    let mut failed = 0;
    for monitor in &monitors {
        let Some(cached) = persisted.settings_cache.get(&monitor.id) else {
            info!(monitor = %monitor.id, "no cached LED state, skipping");
            continue;
        };
        let led = cached.settings.led();
        let mode = led.mode.as_str();
        let command = Command::SetMysticLight {
            monitor_id: monitor.id.clone(),
            led,
        };
        match transport.invoke(command).await {
            Ok(_) => info!(monitor = %monitor.id, mode, "LED state restored"),
            Err(err) => {
                error!(monitor = %monitor.id, error = %err, "LED restore failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("LED restore failed on {failed} of {} monitor(s)", monitors.len());
    }
    Ok(())
}
