use std::io;
use std::path::Path;

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::RemotePart;
use crate::error::{FailureKind, SyncError};
use crate::remote::{ByteRange, RemoteStore};
use crate::utils::retry::{Backoff, with_backoff};

/// Upper bound of the head sample compared against the server.
pub const PROBE_LIMIT: u64 = 1024 * 1024;

/// Unit of comparison and of disk writes.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    Skip,
    ResumeFrom(u64),
    Redownload,
}

/// Decision for one part plus the bytes it adds to the pending total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub plan: TransferPlan,
    pub pending_bytes: u64,
    /// A local file exists that must be removed before the fresh write.
    pub stale: bool,
}

impl PartPlan {
    fn skip() -> Self {
        PartPlan {
            plan: TransferPlan::Skip,
            pending_bytes: 0,
            stale: false,
        }
    }

    fn resume(part: &RemotePart, offset: u64) -> Self {
        PartPlan {
            plan: TransferPlan::ResumeFrom(offset),
            pending_bytes: part.declared_size - offset,
            stale: false,
        }
    }

    fn redownload(part: &RemotePart, stale: bool) -> Self {
        PartPlan {
            plan: TransferPlan::Redownload,
            pending_bytes: part.declared_size,
            stale,
        }
    }
}

/// Decides how a local file relates to its remote part.
///
/// There is no remote modification time, so sizes and a bounded head sample
/// are the only evidence. A differing size is either an interrupted download
/// of the same content (resume) or content that changed on the server
/// (download again); the first `min(1 MiB, local size)` bytes decide which.
/// Files that only differ after that window are treated as resumable.
pub struct Planer<'a> {
    remote: &'a RemoteStore,
    backoff: Backoff,
    cancel: &'a CancellationToken,
}

impl<'a> Planer<'a> {
    pub fn new(remote: &'a RemoteStore, backoff: Backoff, cancel: &'a CancellationToken) -> Self {
        Planer {
            remote,
            backoff,
            cancel,
        }
    }

    /// Reads local state fresh on every call; never creates or deletes files.
    pub async fn plan(&self, local_path: &Path, part: &RemotePart) -> Result<PartPlan, SyncError> {
        let meta = match fs::metadata(local_path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(PartPlan::redownload(part, false));
            }
            Err(err) => return Err(SyncError::fs(local_path, err)),
        };
        if !meta.is_file() {
            return Err(SyncError::fs(
                local_path,
                io::Error::other("not a regular file"),
            ));
        }

        let local_size = meta.len();
        let declared = part.declared_size;
        if local_size == declared {
            return Ok(PartPlan::skip());
        }
        if local_size == 0 || local_size > declared {
            debug!(
                "{}: local size {local_size} cannot be a prefix of {declared}",
                local_path.display()
            );
            return Ok(PartPlan::redownload(part, true));
        }

        let probe = with_backoff(
            self.backoff,
            |err: &SyncError| err.kind() == FailureKind::Network,
            move || self.head_matches(local_path, part, local_size),
        );
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
            outcome = probe => outcome,
        };

        match outcome {
            Ok(true) => Ok(PartPlan::resume(part, local_size)),
            Ok(false) => {
                debug!("{}: head differs from server, local copy is stale", local_path.display());
                Ok(PartPlan::redownload(part, true))
            }
            Err(err) if err.kind() == FailureKind::Network => {
                warn!(
                    "could not compare {} with the server ({err}); downloading it again",
                    local_path.display()
                );
                Ok(PartPlan::redownload(part, true))
            }
            Err(err) => Err(err),
        }
    }

    /// Compares the first `min(PROBE_LIMIT, local_size)` bytes of both sides.
    async fn head_matches(
        &self,
        local_path: &Path,
        part: &RemotePart,
        local_size: u64,
    ) -> Result<bool, SyncError> {
        let limit = local_size.min(PROBE_LIMIT);
        let key = part.remote_key.as_str();
        let response = self.remote.fetch(key, ByteRange::Head(limit)).await?;
        let mut local = File::open(local_path)
            .await
            .map_err(|err| SyncError::fs(local_path, err))?;

        let mut stream = response.bytes_stream();
        let mut local_buf = vec![0u8; CHUNK_SIZE];
        let mut compared = 0u64;

        while compared < limit {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let chunk = chunk.map_err(|err| SyncError::network(key, err))?;

            // servers that ignore the range send the whole body
            let take = chunk.len().min((limit - compared) as usize);
            for remote_piece in chunk[..take].chunks(CHUNK_SIZE) {
                let local_piece = &mut local_buf[..remote_piece.len()];
                match local.read_exact(local_piece).await {
                    Ok(_) => {}
                    Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
                    Err(err) => return Err(SyncError::fs(local_path, err)),
                }
                if local_piece != remote_piece {
                    return Ok(false);
                }
                compared += remote_piece.len() as u64;
            }
        }

        // a server copy shorter than our head is a change too
        Ok(compared == limit)
    }
}
