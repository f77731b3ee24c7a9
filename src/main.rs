use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod catalog;
mod config;
mod downloader;
mod error;
mod logging;
mod remote;
mod utils;

#[cfg(test)]
mod testing;

use config::{DEFAULT_SETTINGS_FILE, Settings};
use downloader::{BarProgress, Preview, Syncer};
use error::SyncError;
use logging::LogOptions;
use remote::RemoteStore;
use utils::retry::Backoff;
use utils::size::format_size;

#[derive(Parser)]
#[command(name = "plexsync")]
#[command(about = "Download a playlist's media to local storage, resuming partial files")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE, help = "Connection settings file")]
    settings: PathBuf,
    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store server address and token in the settings file
    Configure {
        #[arg(short, long, help = "Server base url, e.g. http://127.0.0.1:32400")]
        server: String,
        #[arg(short, long, help = "Access token")]
        token: String,
    },
    /// Show what would be downloaded without downloading
    Preview {
        #[arg(short, long, help = "Item list exported from the catalog")]
        items: PathBuf,
        #[arg(short, long, help = "Destination directory")]
        destination: PathBuf,
    },
    /// Preview, confirm, then download
    Sync {
        #[arg(short, long, help = "Item list exported from the catalog")]
        items: PathBuf,
        #[arg(short, long, help = "Destination directory")]
        destination: PathBuf,
        #[arg(short, long, help = "Don't ask before downloading")]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogOptions {
        debug: cli.debug,
        ..LogOptions::default()
    })?;

    let result = match cli.command {
        Commands::Configure { server, token } => {
            Settings::new(server, token).save(&cli.settings)?;
            println!("Settings written to {}", cli.settings.display());
            Ok(())
        }
        Commands::Preview { items, destination } => {
            let (syncer, items) = prepare(&cli.settings, &items, destination)?;
            downloader::preview(&syncer, &items)
                .await
                .map(|preview| print_preview(&preview))
                .map_err(anyhow::Error::from)
        }
        Commands::Sync {
            items,
            destination,
            yes,
        } => {
            let (syncer, items) = prepare(&cli.settings, &items, destination)?;
            sync(&syncer, &items, yes).await
        }
    };

    match result {
        Err(err) if is_cancelled(&err) => {
            println!("\nStopped by user (Ctrl+C)");
            Ok(())
        }
        other => other,
    }
}

fn prepare(
    settings_path: &Path,
    items_path: &Path,
    destination: PathBuf,
) -> Result<(Syncer, Vec<catalog::MediaItem>)> {
    let settings = Settings::load(settings_path).with_context(|| {
        format!("run `plexsync configure` to create {}", settings_path.display())
    })?;
    let items = catalog::load_items(items_path)?;
    info!(
        "{} items ({} on the server) loaded from {}",
        items.len(),
        format_size(items.iter().map(|item| item.total_size()).sum()),
        items_path.display()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let syncer = Syncer::new(RemoteStore::new(&settings)?, destination, cancel)
        .with_backoff(Backoff::new(settings.probe_attempts))
        .with_progress(Arc::new(BarProgress::new()));
    Ok((syncer, items))
}

async fn sync(syncer: &Syncer, items: &[catalog::MediaItem], yes: bool) -> Result<()> {
    let preview = downloader::preview(syncer, items).await?;
    print_preview(&preview);

    if !has_pending(&preview)? {
        println!("Nothing to download");
        return Ok(());
    }
    if !yes && !confirm("Press Y to continue downloading: ").await? {
        println!("Aborted.");
        return Ok(());
    }

    // everything is classified again: the destination may have changed
    let summary = downloader::download(syncer, items).await?;
    println!("Finished: {summary}");
    if !summary.is_success() {
        bail!("{} item(s) could not be synced", summary.failed.len());
    }
    Ok(())
}

/// `Ok(false)` means everything is in place. Failed items with nothing
/// left to transfer still fail the run.
fn has_pending(preview: &Preview) -> Result<bool> {
    if !preview.is_empty() {
        return Ok(true);
    }
    if !preview.failed.is_empty() {
        bail!(
            "nothing to download, but {} item(s) could not be synced",
            preview.failed.len()
        );
    }
    Ok(false)
}

fn print_preview(preview: &Preview) {
    println!("Items to download:");
    for report in &preview.pending {
        println!("{} ({})", report.title, format_size(report.bytes));
    }
    for report in &preview.failed {
        for failure in &report.failures {
            warn!("{}: {failure}", report.title);
        }
        if report.bytes > 0 {
            println!("{} ({}, incomplete)", report.title, format_size(report.bytes));
        }
    }
    println!(
        "Total: {} items, {}",
        preview.item_count(),
        format_size(preview.total_bytes)
    );
    println!("-------------------------------------------------------------");
}

async fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| line)
    });
    tokio::select! {
        answer = answer => Ok(answer??.trim().eq_ignore_ascii_case("y")),
        _ = tokio::signal::ctrl_c() => {
            println!("\nStopped by user (Ctrl+C)");
            // the blocking stdin read cannot be interrupted
            std::process::exit(0);
        }
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<SyncError>(), Some(SyncError::Cancelled))
}
