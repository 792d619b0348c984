//! Shared progress state: per-worker slots, outcome counters, byte counters.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::format::format_size;

/// What a worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerStatus {
    #[default]
    Idle,
    Downloading,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerProgress {
    pub status: WorkerStatus,
    pub current_path: Option<PathBuf>,
}

/// Terminal outcomes so far, plus non-terminal failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub completed: usize,
    pub skipped: usize,
    pub forbidden: usize,
    pub abandoned: usize,
    pub gave_up: usize,
    /// Failed attempts that put the task back in the queue.
    pub retries: usize,
}

impl OutcomeCounts {
    /// Tasks that reached a terminal state.
    pub fn resolved(&self) -> usize {
        self.completed + self.skipped + self.forbidden + self.abandoned + self.gave_up
    }
}

struct Sampler {
    last: Instant,
    bytes_per_sec: f64,
}

/// Aggregated run progress, shared by workers, the renewal thread and the renderer.
pub struct ProgressTracker {
    total: usize,
    render_enabled: bool,
    workers: Mutex<Vec<WorkerProgress>>,
    counts: Mutex<OutcomeCounts>,
    bytes_since_sample: AtomicU64,
    completed_bytes: AtomicU64,
    sampler: Mutex<Sampler>,
    silenced: AtomicUsize,
    line_dirty: AtomicBool,
}

/// Suppresses the status line while alive. Nests.
pub struct SilenceGuard<'a> {
    tracker: &'a ProgressTracker,
}

impl Drop for SilenceGuard<'_> {
    fn drop(&mut self) {
        self.tracker.silenced.fetch_sub(1, Ordering::AcqRel);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProgressTracker {
    pub fn new(total: usize, workers: usize) -> Self {
        Self {
            total,
            render_enabled: true,
            workers: Mutex::new(vec![WorkerProgress::default(); workers]),
            counts: Mutex::new(OutcomeCounts::default()),
            bytes_since_sample: AtomicU64::new(0),
            completed_bytes: AtomicU64::new(0),
            sampler: Mutex::new(Sampler {
                last: Instant::now(),
                bytes_per_sec: 0.0,
            }),
            silenced: AtomicUsize::new(0),
            line_dirty: AtomicBool::new(false),
        }
    }

    /// Disable console output entirely (counters keep working).
    pub fn without_rendering(mut self) -> Self {
        self.render_enabled = false;
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn set_worker(&self, worker: usize, status: WorkerStatus, path: Option<&Path>) {
        let mut workers = lock(&self.workers);
        if worker >= workers.len() {
            workers.resize(worker + 1, WorkerProgress::default());
        }
        workers[worker] = WorkerProgress {
            status,
            current_path: path.map(Path::to_path_buf),
        };
    }

    pub fn start(&self, worker: usize, path: &Path) {
        tracing::debug!(worker, path = %path.display(), "downloading");
        self.set_worker(worker, WorkerStatus::Downloading, Some(path));
    }

    pub fn completed(&self, worker: usize, path: &Path, bytes: u64) {
        tracing::debug!(worker, path = %path.display(), bytes, "downloaded");
        self.completed_bytes.fetch_add(bytes, Ordering::Relaxed);
        lock(&self.counts).completed += 1;
        self.set_worker(worker, WorkerStatus::Done, Some(path));
    }

    pub fn skipped(&self, worker: usize, path: &Path) {
        tracing::debug!(worker, path = %path.display(), "skipped (exists)");
        lock(&self.counts).skipped += 1;
        self.set_worker(worker, WorkerStatus::Done, Some(path));
    }

    pub fn forbidden(&self, worker: usize, path: &Path, status: u32) {
        tracing::warn!(worker, path = %path.display(), status, "forbidden");
        lock(&self.counts).forbidden += 1;
        self.set_worker(worker, WorkerStatus::Failed, Some(path));
    }

    pub fn gave_up(&self, worker: usize, path: &Path, reason: &str) {
        tracing::warn!(worker, path = %path.display(), "giving up: {}", reason);
        lock(&self.counts).gave_up += 1;
        self.set_worker(worker, WorkerStatus::Failed, Some(path));
    }

    /// Non-terminal failure: the task goes back in the queue.
    pub fn retrying(&self, worker: usize, path: &Path, reason: &str) {
        tracing::debug!(worker, path = %path.display(), "failed, requeued: {}", reason);
        lock(&self.counts).retries += 1;
        self.set_worker(worker, WorkerStatus::Failed, Some(path));
    }

    pub fn abandoned(&self, n: usize) {
        if n > 0 {
            lock(&self.counts).abandoned += n;
        }
    }

    pub fn worker_exited(&self, worker: usize) {
        self.set_worker(worker, WorkerStatus::Idle, None);
    }

    /// Bytes received by an in-flight transfer. Feeds the throughput sample
    /// only: bytes of attempts that later fail are counted here, never in
    /// [`completed_bytes`](Self::completed_bytes).
    pub fn add_bytes(&self, n: u64) {
        self.bytes_since_sample.fetch_add(n, Ordering::Relaxed);
    }

    /// Throughput since the previous sample; resets the accumulator.
    pub fn sample(&self) -> f64 {
        let mut sampler = lock(&self.sampler);
        let now = Instant::now();
        let elapsed = now.duration_since(sampler.last).as_secs_f64();
        let bytes = self.bytes_since_sample.swap(0, Ordering::Relaxed);
        sampler.bytes_per_sec = if elapsed > 0.0 { bytes as f64 / elapsed } else { 0.0 };
        sampler.last = now;
        sampler.bytes_per_sec
    }

    pub fn bytes_per_sec(&self) -> f64 {
        lock(&self.sampler).bytes_per_sec
    }

    pub fn counts(&self) -> OutcomeCounts {
        *lock(&self.counts)
    }

    /// Sum of the sizes of files that were completed.
    pub fn completed_bytes(&self) -> u64 {
        self.completed_bytes.load(Ordering::Relaxed)
    }

    pub fn worker(&self, worker: usize) -> Option<WorkerProgress> {
        lock(&self.workers).get(worker).cloned()
    }

    pub fn active_workers(&self) -> usize {
        lock(&self.workers)
            .iter()
            .filter(|w| w.status == WorkerStatus::Downloading)
            .count()
    }

    /// `[  12 / 340] ( 3.53%) CN:4 -- 1.2MB/s`
    pub fn status_line(&self) -> String {
        let done = self.counts().resolved();
        let total = self.total;
        let pct = if total == 0 {
            100.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        let digits = total.max(1).to_string().len();
        format!(
            "[{:>digits$} / {}] ({:5.2}%) CN:{} -- {}/s",
            done,
            total,
            pct,
            self.active_workers(),
            format_size(self.bytes_per_sec()),
            digits = digits
        )
    }

    /// Suppress the status line until the guard drops.
    pub fn silence(&self) -> SilenceGuard<'_> {
        self.silenced.fetch_add(1, Ordering::AcqRel);
        SilenceGuard { tracker: self }
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced.load(Ordering::Acquire) > 0
    }

    /// Rewrite the status line in place on stderr.
    pub fn render(&self) {
        if !self.render_enabled || self.is_silenced() {
            return;
        }
        let line = self.status_line();
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r{}   \r", line);
        let _ = err.flush();
        self.line_dirty.store(true, Ordering::Relaxed);
    }

    /// Blank the status line (end of run).
    pub fn clear_line(&self) {
        if !self.line_dirty.swap(false, Ordering::Relaxed) {
            return;
        }
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r{:80}\r", "");
        let _ = err.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn counts_and_status_line() {
        let t = ProgressTracker::new(10, 2).without_rendering();
        t.start(0, Path::new("a.pdf"));
        t.start(1, Path::new("b.pdf"));
        assert_eq!(t.active_workers(), 2);
        t.completed(0, Path::new("a.pdf"), 100);
        t.skipped(1, Path::new("b.pdf"));
        t.forbidden(1, Path::new("c.pdf"), 403);
        t.retrying(0, Path::new("d.pdf"), "HTTP 500");
        let c = t.counts();
        assert_eq!(c.resolved(), 3);
        assert_eq!(c.retries, 1);
        assert_eq!(t.completed_bytes(), 100);
        assert_eq!(t.active_workers(), 0);
        assert_eq!(t.status_line(), "[ 3 / 10] (30.00%) CN:0 -- 0B/s");
    }

    #[test]
    fn sample_measures_and_resets() {
        let t = ProgressTracker::new(1, 1).without_rendering();
        t.sample();
        t.add_bytes(4096);
        thread::sleep(Duration::from_millis(50));
        let rate = t.sample();
        assert!(rate > 0.0);
        assert!(rate <= 4096.0 / 0.05 + 1.0);
        assert_eq!(t.sample().round(), 0.0);
    }

    #[test]
    fn aborted_bytes_count_toward_rate_but_not_completed_bytes() {
        let t = ProgressTracker::new(1, 1).without_rendering();
        t.sample();
        t.add_bytes(700);
        t.retrying(0, Path::new("a.pdf"), "connection reset");
        t.add_bytes(300);
        t.completed(0, Path::new("a.pdf"), 300);
        thread::sleep(Duration::from_millis(10));
        assert!(t.sample() > 0.0);
        assert_eq!(t.completed_bytes(), 300);
    }

    #[test]
    fn silence_nests() {
        let t = ProgressTracker::new(1, 1);
        assert!(!t.is_silenced());
        {
            let _a = t.silence();
            {
                let _b = t.silence();
                assert!(t.is_silenced());
            }
            assert!(t.is_silenced());
        }
        assert!(!t.is_silenced());
    }

    #[test]
    fn empty_run_is_complete() {
        let t = ProgressTracker::new(0, 1);
        assert!(t.status_line().starts_with("[0 / 0] (100.00%)"));
    }
}
