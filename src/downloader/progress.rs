//! Progress reporting for part transfers.
//!
//! The engine only talks to [`ProgressSink`]; terminal bars live behind
//! [`BarProgress`] so tests and other front ends can plug in anything.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives transfer progress for a single part.
pub trait ProgressSink: Send {
    /// Called before any bytes move. `initial` is what is already on disk.
    fn start(&mut self, _initial: u64, _total: u64) {}

    fn advance(&mut self, bytes: u64);

    fn finish(&mut self) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(u64) + Send,
{
    fn advance(&mut self, bytes: u64) {
        self(bytes)
    }
}

/// Hands out one sink per transferred part.
pub trait Progress: Send + Sync {
    fn part(&self, label: &str) -> Box<dyn ProgressSink>;
}

pub struct NoProgress;

impl Progress for NoProgress {
    fn part(&self, _label: &str) -> Box<dyn ProgressSink> {
        Box::new(|_: u64| {})
    }
}

/// Byte progress bars on stderr, one per part.
pub struct BarProgress {
    mp: MultiProgress,
    style: ProgressStyle,
}

impl BarProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{prefix} {percent:>3}%|{wide_bar}| {bytes}/{total_bytes} [{elapsed_precise}<{eta}, {binary_bytes_per_sec}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        BarProgress {
            mp: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            style,
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn part(&self, label: &str) -> Box<dyn ProgressSink> {
        let bar = self.mp.add(ProgressBar::new(0));
        bar.set_style(self.style.clone());
        bar.set_prefix(label.to_string());
        Box::new(BarSink { bar })
    }
}

struct BarSink {
    bar: ProgressBar,
}

impl ProgressSink for BarSink {
    fn start(&mut self, initial: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(initial);
        self.bar.reset_eta();
    }

    fn advance(&mut self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}

impl Drop for BarSink {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

/// Truncates a title to `max` characters for progress labels.
pub fn short_title(title: &str, max: usize) -> &str {
    match title.char_indices().nth(max) {
        Some((idx, _)) => &title[..idx],
        None => title,
    }
}
