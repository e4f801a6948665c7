/// Batch progress tracking.
///
/// `BatchProgress` is the only counter shared between download tasks. Sinks
/// observe it; the terminal sink draws an indicatif bar.
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Default)]
pub struct BatchProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new batch of `total` tasks.
    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Record one finished task and return the new completed count.
    pub fn complete_one(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Receives batch lifecycle notifications. Called from worker tasks, so
/// implementations must be thread-safe.
pub trait ProgressSink: Send + Sync {
    fn started(&self, total: usize);
    fn advanced(&self, completed: usize, total: usize);
    fn finished(&self);
}

/// Sink that ignores everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn started(&self, _total: usize) {}
    fn advanced(&self, _completed: usize, _total: usize) {}
    fn finished(&self) {}
}

pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message("Loading");
        Self { bar }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn started(&self, total: usize) {
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn advanced(&self, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }

    fn finished(&self) {
        self.bar.finish_and_clear();
    }
}
