#![allow(dead_code)]

pub mod fake_site;
pub mod site_server;

use bulkfetch_core::orchestrator::RunOptions;
use std::time::Duration;

/// Quiet, fast options for tests.
pub fn test_options(workers: usize) -> RunOptions {
    RunOptions {
        workers,
        progress_interval: Duration::from_millis(10),
        checkpoint_interval: Duration::from_millis(20),
        render_progress: false,
        ..RunOptions::default()
    }
}

/// Deterministic body for a file id; sizes differ between ids.
pub fn body_for(id: i64) -> Vec<u8> {
    format!("contents of file {}\n", id)
        .repeat(id.rem_euclid(7) as usize + 1)
        .into_bytes()
}
