mod executor;
mod paths;
mod planer;
mod progress;
mod report;
mod sync;

pub use progress::BarProgress;
pub use report::{BatchSummary, Preview};
pub use sync::{SyncMode, Syncer};

use crate::catalog::MediaItem;
use crate::error::SyncError;

/// Dry run over all items: what would be transferred, without transferring.
pub async fn preview(syncer: &Syncer, items: &[MediaItem]) -> Result<Preview, SyncError> {
    let mut preview = Preview::default();
    for item in items {
        let report = syncer.sync_item(item, SyncMode::DryRun, "").await?;
        preview.record(report);
    }
    Ok(preview)
}

/// Live run over all items in the given order.
pub async fn download(syncer: &Syncer, items: &[MediaItem]) -> Result<BatchSummary, SyncError> {
    let mut summary = BatchSummary::default();
    let total = items.len();
    for (i, item) in items.iter().enumerate() {
        let position = format!("[{}/{}]", i + 1, total);
        let report = syncer.sync_item(item, SyncMode::Live, &position).await?;
        summary.record(report);
    }
    Ok(summary)
}
