use std::path::Path;

use futures::StreamExt;
use reqwest::{Response, StatusCode};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::RemotePart;
use crate::downloader::planer::{CHUNK_SIZE, TransferPlan};
use crate::downloader::progress::ProgressSink;
use crate::error::SyncError;
use crate::remote::{ByteRange, RemoteStore};

/// Streams part bytes to disk according to a [`TransferPlan`].
///
/// Interrupted transfers leave the partial file in place so the next run can
/// resume it.
pub struct Executor<'a> {
    remote: &'a RemoteStore,
    cancel: &'a CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(remote: &'a RemoteStore, cancel: &'a CancellationToken) -> Self {
        Executor { remote, cancel }
    }

    /// Returns the number of bytes written by this call.
    pub async fn transfer(
        &self,
        part: &RemotePart,
        destination: &Path,
        plan: TransferPlan,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, SyncError> {
        let offset = match plan {
            TransferPlan::Skip => return Ok(0),
            TransferPlan::Redownload => 0,
            TransferPlan::ResumeFrom(offset) => offset,
        };
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| SyncError::fs(parent, err))?;
        }

        let key = part.remote_key.as_str();
        let range = if offset > 0 {
            ByteRange::From(offset)
        } else {
            ByteRange::Full
        };
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
            response = self.remote.fetch(key, range) => response?,
        };

        let resumed = offset > 0 && response.status() == StatusCode::PARTIAL_CONTENT;
        if offset > 0 && !resumed {
            warn!(
                "server ignored range request for {key} ({}); starting over",
                response.status()
            );
        }
        let start = if resumed { offset } else { 0 };

        let mut options = OpenOptions::new();
        if resumed {
            options.append(true);
        } else {
            options.write(true).create(true).truncate(true);
        }
        let mut file = options
            .open(destination)
            .await
            .map_err(|err| SyncError::fs(destination, err))?;

        info!(
            "downloading {} ({} of {} bytes)",
            destination.display(),
            part.declared_size - start.min(part.declared_size),
            part.declared_size
        );
        progress.start(start, part.declared_size);

        let copied = self
            .copy_body(response, &mut file, destination, key, progress)
            .await;
        // keep what was written even when the stream failed
        let flushed = file.flush().await;
        let written = copied?;
        flushed.map_err(|err| SyncError::fs(destination, err))?;
        progress.finish();

        let actual = file
            .metadata()
            .await
            .map_err(|err| SyncError::fs(destination, err))?
            .len();
        if actual != part.declared_size {
            return Err(SyncError::Incomplete {
                key: key.to_string(),
                actual,
                expected: part.declared_size,
            });
        }
        Ok(written)
    }

    async fn copy_body(
        &self,
        response: Response,
        file: &mut File,
        destination: &Path,
        key: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, SyncError> {
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|err| SyncError::network(key, err))?;

            for piece in chunk.chunks(CHUNK_SIZE) {
                file.write_all(piece)
                    .await
                    .map_err(|err| SyncError::fs(destination, err))?;
                written += piece.len() as u64;
                progress.advance(piece.len() as u64);
            }
        }

        Ok(written)
    }
}
