use std::path::Path;
use std::time::Duration;

use crate::control::StopSignal;
use crate::progress::ProgressTracker;

use super::{save_to_path, ForbiddenSet};

fn save_snapshot(set: &ForbiddenSet, path: &Path, progress: &ProgressTracker) {
    let snapshot = set.snapshot();
    let _quiet = progress.silence();
    match save_to_path(path, &snapshot) {
        Ok(()) => tracing::info!("saved snapshot of forbidden files: {}", snapshot.len()),
        Err(e) => tracing::warn!(path = %path.display(), "saving forbidden files failed: {:#}", e),
    }
}

/// Save the set now, every `interval`, and once more when `stop` fires.
/// Failures are logged and the loop carries on.
pub fn run_checkpoint_loop(
    set: &ForbiddenSet,
    path: &Path,
    stop: &StopSignal,
    interval: Duration,
    progress: &ProgressTracker,
) {
    loop {
        save_snapshot(set, path, progress);
        if stop.wait_timeout(interval) {
            break;
        }
    }
    save_snapshot(set, path, progress);
}
