//! numfs - Mount a NumWorks calculator's scripts as a FUSE filesystem.
//!
//! Usage: numfs --storage <backup.json> <mountpoint>
//!
//! Runs in the background by default; pass `-f` to stay attached to the
//! terminal. Exit codes: 0 after a clean unmount, 1 when setup fails, 2 when
//! the device went away while mounted.

use anyhow::{Context, Result};
use clap::Parser;
use numfs_core::{BackupFileTransport, DEFAULT_STORAGE_SIZE};
use numfs_fuse::daemon::{foreground_command, spawn_as_daemon};
use numfs_fuse::{MountConfig, MountEvent, NumworksFS};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_SETUP_FAILURE: u8 = 1;
const EXIT_DISCONNECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "numfs")]
#[command(about = "Mount NumWorks calculator scripts as a FUSE filesystem")]
#[command(version)]
struct Cli {
    /// Directory to mount to
    mount: PathBuf,

    /// Storage backup file holding the device records
    #[arg(short, long, env = "NUMFS_STORAGE")]
    storage: PathBuf,

    /// Device storage capacity in bytes
    #[arg(long, default_value_t = DEFAULT_STORAGE_SIZE)]
    capacity: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Stay in the foreground
    #[arg(short, long, overrides_with = "background")]
    foreground: bool,

    /// Detach from the terminal (default)
    #[arg(short, long, overrides_with = "foreground")]
    background: bool,

    /// Let other users access the mount
    #[arg(long)]
    allow_other: bool,
}

/// Why the mount ended.
enum Outcome {
    Unmounted,
    Detached,
    Disconnected,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match run(cli) {
        Ok(Outcome::Unmounted | Outcome::Detached) => ExitCode::SUCCESS,
        Ok(Outcome::Disconnected) => ExitCode::from(EXIT_DISCONNECTED),
        Err(e) => {
            error!(error = %e, "Setup failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    if !cli.mount.is_dir() {
        anyhow::bail!("Mountpoint is not a directory: {}", cli.mount.display());
    }

    if !cli.foreground {
        let exe = std::env::current_exe().context("Failed to locate numfs executable")?;
        let mut command = foreground_command(&exe, std::env::args_os().skip(1));
        let pid = spawn_as_daemon(&mut command).context("Failed to start background mount")?;
        info!(pid = pid, "Mount running in background");
        return Ok(Outcome::Detached);
    }

    let transport = BackupFileTransport::new(&cli.storage, cli.capacity);
    let config = MountConfig::default().allow_other(cli.allow_other);

    let (tx, rx) = mpsc::channel::<MountEvent>();
    let fs = NumworksFS::new(transport, config.clone())
        .context("Failed to initialize filesystem")?
        .with_events(tx.clone());
    fs.check_connection()
        .with_context(|| format!("No device at {}", cli.storage.display()))?;

    ctrlc::set_handler(move || {
        let _ = tx.send(MountEvent::Interrupted);
    })
    .context("Failed to set signal handler")?;

    info!(
        storage = %cli.storage.display(),
        mount = %cli.mount.display(),
        "Mounting device (press Ctrl+C to unmount)"
    );

    let session = fuser::spawn_mount2(fs, &cli.mount, &config.mount_options()).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    let outcome = match rx.recv() {
        Ok(MountEvent::Interrupted) => {
            info!("Received interrupt signal, unmounting...");
            Outcome::Unmounted
        }
        Ok(MountEvent::Disconnected) => {
            error!("Device disconnected, unmounting");
            Outcome::Disconnected
        }
        Err(_) => {
            warn!("Event channel closed unexpectedly");
            Outcome::Unmounted
        }
    };

    drop(session);
    info!("Filesystem unmounted");
    Ok(outcome)
}
