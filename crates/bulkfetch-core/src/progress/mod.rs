//! Live progress: per-worker status, throughput sampling and the console
//! status line.

mod format;
mod tracker;

pub use format::format_size;
pub use tracker::{OutcomeCounts, ProgressTracker, SilenceGuard, WorkerProgress, WorkerStatus};

use std::time::Duration;

use crate::control::StopSignal;

/// Sampler + renderer loop: every `interval`, compute throughput and redraw
/// the status line. Returns when `stop` fires.
pub fn run_progress_loop(tracker: &ProgressTracker, stop: &StopSignal, interval: Duration) {
    tracker.sample();
    loop {
        tracker.render();
        if stop.wait_timeout(interval) {
            break;
        }
        tracker.sample();
    }
}
