use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::{MediaItem, RemotePart};
use crate::downloader::executor::Executor;
use crate::downloader::paths::{clean_path_part, map_part_path};
use crate::downloader::planer::{Planer, TransferPlan};
use crate::downloader::progress::{NoProgress, Progress, short_title};
use crate::downloader::report::{ItemReport, PartFailure};
use crate::error::SyncError;
use crate::remote::RemoteStore;
use crate::utils::retry::Backoff;

const TITLE_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Classify only and report what would be downloaded.
    DryRun,
    Live,
}

/// Reconciles items against `destination`.
///
/// Holds no state between calls: every pass re-reads the filesystem and the
/// server, so a preview followed by a live run sees any change made in
/// between.
pub struct Syncer {
    remote: RemoteStore,
    destination: PathBuf,
    cancel: CancellationToken,
    backoff: Backoff,
    progress: Arc<dyn Progress>,
}

impl Syncer {
    pub fn new(remote: RemoteStore, destination: PathBuf, cancel: CancellationToken) -> Self {
        Syncer {
            remote,
            destination,
            cancel,
            backoff: Backoff::new(3),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// `destination / section title / relative`.
    pub fn local_path(&self, item: &MediaItem, relative: &Path) -> PathBuf {
        self.destination
            .join(clean_path_part(&item.section_title))
            .join(relative)
    }

    /// Dry runs only need a readable destination; live runs create it.
    async fn check_destination(&self, mode: SyncMode) -> Result<(), SyncError> {
        let unusable = |reason: String| SyncError::Destination {
            path: self.destination.clone(),
            reason,
        };

        match fs::metadata(&self.destination).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(unusable("not a directory".to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => match mode {
                SyncMode::DryRun => Ok(()),
                SyncMode::Live => fs::create_dir_all(&self.destination)
                    .await
                    .map_err(|err| unusable(err.to_string())),
            },
            Err(err) => Err(unusable(err.to_string())),
        }
    }

    /// Processes every part of `item` in media/part order.
    ///
    /// Per-part problems end up in the report; only cancellation and an
    /// unusable destination abort with `Err`. `position` prefixes the
    /// progress label, e.g. `[3/12]`.
    pub async fn sync_item(
        &self,
        item: &MediaItem,
        mode: SyncMode,
        position: &str,
    ) -> Result<ItemReport, SyncError> {
        self.check_destination(mode).await?;

        let planer = Planer::new(&self.remote, self.backoff, &self.cancel);
        let executor = Executor::new(&self.remote, &self.cancel);
        let mut report = ItemReport::new(&item.title);

        for (media_index, part_index, part) in item.parts() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match self
                .sync_part(&planer, &executor, item, part, mode, position)
                .await
            {
                Ok(bytes) => report.bytes += bytes,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("{}: skipping part {}: {err}", item.title, part.remote_key);
                    report.failures.push(PartFailure {
                        media_index,
                        part_index,
                        remote_key: part.remote_key.clone(),
                        error: err,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn sync_part(
        &self,
        planer: &Planer<'_>,
        executor: &Executor<'_>,
        item: &MediaItem,
        part: &RemotePart,
        mode: SyncMode,
        position: &str,
    ) -> Result<u64, SyncError> {
        let relative = map_part_path(&item.section_locations, &part.source_path).ok_or_else(|| {
            SyncError::NotMapped {
                path: part.source_path.clone(),
            }
        })?;
        let local_path = self.local_path(item, &relative);

        let plan = planer.plan(&local_path, part).await?;
        debug!("{}: {:?}", local_path.display(), plan);

        match mode {
            SyncMode::DryRun => Ok(plan.pending_bytes),
            SyncMode::Live => {
                if plan.plan == TransferPlan::Skip {
                    return Ok(0);
                }
                if plan.plan == TransferPlan::Redownload && plan.stale {
                    match fs::remove_file(&local_path).await {
                        Ok(()) => {}
                        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                        Err(err) => return Err(SyncError::fs(&local_path, err)),
                    }
                }

                let label = format!("{position} {}", short_title(&item.title, TITLE_WIDTH));
                let mut sink = self.progress.part(label.trim());
                executor
                    .transfer(part, &local_path, plan.plan, sink.as_mut())
                    .await
            }
        }
    }
}
