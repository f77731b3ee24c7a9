use std::fmt;

use crate::error::SyncError;
use crate::utils::size::format_size;

/// A part that could not be reconciled; the rest of the item carried on.
#[derive(Debug)]
pub struct PartFailure {
    pub media_index: usize,
    pub part_index: usize,
    pub remote_key: String,
    pub error: SyncError,
}

impl fmt::Display for PartFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "media {} part {} ({}): {}",
            self.media_index, self.part_index, self.remote_key, self.error
        )
    }
}

/// Outcome of one `sync_item` call. `bytes` is pending bytes on a dry run and
/// written bytes on a live run.
#[derive(Debug)]
pub struct ItemReport {
    pub title: String,
    pub bytes: u64,
    pub failures: Vec<PartFailure>,
}

impl ItemReport {
    pub fn new(title: &str) -> Self {
        ItemReport {
            title: title.to_string(),
            bytes: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of the dry-run pass shown before confirmation.
#[derive(Debug, Default)]
pub struct Preview {
    /// Items with something to transfer, in input order.
    pub pending: Vec<ItemReport>,
    pub total_bytes: u64,
    /// Items that hit per-part problems during classification.
    pub failed: Vec<ItemReport>,
}

impl Preview {
    pub fn record(&mut self, report: ItemReport) {
        self.total_bytes += report.bytes;
        if !report.is_success() {
            self.failed.push(report);
        } else if report.bytes > 0 {
            self.pending.push(report);
        }
    }

    pub fn item_count(&self) -> usize {
        self.pending.len() + self.failed.iter().filter(|r| r.bytes > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }
}

/// Totals of the live pass.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub items: usize,
    pub succeeded: usize,
    pub bytes: u64,
    pub failed: Vec<ItemReport>,
}

impl BatchSummary {
    pub fn record(&mut self, report: ItemReport) {
        self.items += 1;
        self.bytes += report.bytes;
        if report.is_success() {
            self.succeeded += 1;
        } else {
            self.failed.push(report);
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} items synced, {} transferred",
            self.succeeded,
            self.items,
            format_size(self.bytes)
        )?;
        for report in &self.failed {
            write!(f, "\n  failed: {}", report.title)?;
            for failure in &report.failures {
                write!(f, "\n    {failure}")?;
            }
        }
        Ok(())
    }
}
