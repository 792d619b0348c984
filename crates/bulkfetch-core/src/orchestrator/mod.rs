//! Wires the queue, session holder, workers and background threads into one run.

mod report;

pub use report::RunReport;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::auth::Authenticator;
use crate::config::FetchConfig;
use crate::control::StopSignal;
use crate::forbidden::{self, run_checkpoint_loop, ForbiddenSet};
use crate::progress::{run_progress_loop, ProgressTracker};
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use crate::session::{run_renewal_loop, RenewalStats, SessionHolder};
use crate::task::{Credentials, DownloadTask};
use crate::transport::Transport;
use crate::worker::{run_worker, WorkerContext};

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub workers: usize,
    pub overwrite: bool,
    pub retry: RetryPolicy,
    pub progress_interval: Duration,
    pub checkpoint_interval: Duration,
    /// Where the forbidden set is checkpointed; `None` disables checkpoints.
    pub checkpoint_path: Option<PathBuf>,
    /// Draw the status line on stderr.
    pub render_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        let cfg = FetchConfig::default();
        Self {
            workers: cfg.workers,
            overwrite: cfg.overwrite,
            retry: cfg.retry_policy(),
            progress_interval: cfg.progress_interval(),
            checkpoint_interval: cfg.checkpoint_interval(),
            checkpoint_path: None,
            render_progress: true,
        }
    }
}

impl RunOptions {
    /// Options from config, checkpointing to `<out_dir>/forbidden.json`.
    pub fn from_config(cfg: &FetchConfig, out_dir: &Path) -> Self {
        Self {
            workers: cfg.workers,
            overwrite: cfg.overwrite,
            retry: cfg.retry_policy(),
            progress_interval: cfg.progress_interval(),
            checkpoint_interval: cfg.checkpoint_interval(),
            checkpoint_path: Some(forbidden::default_path(out_dir)),
            render_progress: true,
        }
    }
}

#[derive(Default)]
struct Threads {
    workers: Vec<JoinHandle<()>>,
    renewal: Option<JoinHandle<RenewalStats>>,
    progress: Option<JoinHandle<()>>,
    checkpoint: Option<JoinHandle<()>>,
}

impl Threads {
    /// Stop and join everything that was started. Workers get one sentinel
    /// each; background threads are released by the holder and the stop signal.
    fn shutdown(mut self, queue: &TaskQueue, holder: &SessionHolder, stop: &StopSignal) -> RenewalStats {
        queue.push_shutdown(self.workers.len());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        holder.stop();
        stop.stop();
        let stats = match self.renewal.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("renewal thread panicked");
                RenewalStats::default()
            }
            None => RenewalStats::default(),
        };
        for handle in [self.progress.take(), self.checkpoint.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::error!("background thread panicked");
            }
        }
        stats
    }
}

/// Download every task, renewing the session as needed, and return the report.
///
/// Blocks until each task is completed, skipped, forbidden, given up or
/// abandoned after a failed login.
pub fn run(
    tasks: Vec<DownloadTask>,
    credentials: &Credentials,
    opts: &RunOptions,
    forbidden: ForbiddenSet,
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
) -> Result<RunReport> {
    let started = Instant::now();
    let total = tasks.len();
    if total == 0 {
        tracing::info!("nothing to download");
        return Ok(RunReport {
            forbidden: forbidden.into_set(),
            elapsed: started.elapsed(),
            ..Default::default()
        });
    }

    let workers = opts.workers.max(1);
    tracing::info!(tasks = total, workers, overwrite = opts.overwrite, "starting run");

    let queue = Arc::new(TaskQueue::new());
    for task in tasks {
        queue.enqueue(task);
    }
    let holder = Arc::new(SessionHolder::new());
    let mut tracker = ProgressTracker::new(total, workers);
    if !opts.render_progress {
        tracker = tracker.without_rendering();
    }
    let progress = Arc::new(tracker);
    let stop = StopSignal::new();
    let ctx = WorkerContext::new(
        Arc::clone(&queue),
        Arc::clone(&holder),
        forbidden.clone(),
        Arc::clone(&progress),
        transport,
    )
    .with_overwrite(opts.overwrite)
    .with_retry(opts.retry);

    let mut threads = Threads::default();
    let spawned = spawn_all(&mut threads, workers, &ctx, credentials, opts, authenticator, &stop);
    if let Err(e) = spawned {
        holder.mark_dead();
        queue.abandon_pending();
        threads.shutdown(&queue, &holder, &stop);
        progress.clear_line();
        return Err(e);
    }

    queue.await_drain();
    tracing::debug!("queue drained, shutting down workers");
    let stats = threads.shutdown(&queue, &holder, &stop);
    progress.clear_line();

    let report = RunReport {
        total,
        forbidden: forbidden.snapshot(),
        counts: progress.counts(),
        completed_bytes: progress.completed_bytes(),
        logins: stats.logins,
        login_failed: stats.failed,
        elapsed: started.elapsed(),
    };
    tracing::info!("{}", report);
    Ok(report)
}

fn spawn_all(
    threads: &mut Threads,
    workers: usize,
    ctx: &WorkerContext,
    credentials: &Credentials,
    opts: &RunOptions,
    authenticator: Arc<dyn Authenticator>,
    stop: &StopSignal,
) -> Result<()> {
    let holder = Arc::clone(&ctx.session);
    let queue = Arc::clone(&ctx.queue);
    let progress = Arc::clone(&ctx.progress);
    let creds = credentials.clone();
    threads.renewal = Some(
        thread::Builder::new()
            .name("session-renewal".into())
            .spawn(move || run_renewal_loop(&holder, authenticator.as_ref(), &creds, &queue, &progress))
            .context("spawning session renewal thread")?,
    );

    let progress = Arc::clone(&ctx.progress);
    let s = stop.clone();
    let interval = opts.progress_interval;
    threads.progress = Some(
        thread::Builder::new()
            .name("progress".into())
            .spawn(move || run_progress_loop(&progress, &s, interval))
            .context("spawning progress thread")?,
    );

    if let Some(path) = opts.checkpoint_path.clone() {
        let set = ctx.forbidden.clone();
        let progress = Arc::clone(&ctx.progress);
        let s = stop.clone();
        let interval = opts.checkpoint_interval;
        threads.checkpoint = Some(
            thread::Builder::new()
                .name("checkpoint".into())
                .spawn(move || run_checkpoint_loop(&set, &path, &s, interval, &progress))
                .context("spawning checkpoint thread")?,
        );
    }

    for id in 0..workers {
        let ctx = ctx.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || run_worker(id, &ctx))
            .with_context(|| format!("spawning worker {}", id))?;
        threads.workers.push(handle);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LoginError;
    use crate::session::Session;

    struct NeverLogin;

    impl Authenticator for NeverLogin {
        fn login(&self, _c: &Credentials) -> Result<Session, LoginError> {
            panic!("no login expected for an empty run");
        }
    }

    #[test]
    fn empty_run_returns_initial_forbidden() {
        let report = run(
            Vec::new(),
            &Credentials::new("u", "p"),
            &RunOptions::default(),
            ForbiddenSet::from_ids([5, 6]),
            Arc::new(crate::transport::CurlTransport::default()),
            Arc::new(NeverLogin),
        )
        .unwrap();
        assert_eq!(report.forbidden.into_iter().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(report.total, 0);
        assert_eq!(report.logins, 0);
    }

    #[test]
    fn options_from_config_checkpoint_in_out_dir() {
        let mut cfg = FetchConfig::default();
        cfg.workers = 3;
        cfg.overwrite = false;
        let opts = RunOptions::from_config(&cfg, Path::new("results"));
        assert_eq!(opts.workers, 3);
        assert!(!opts.overwrite);
        assert_eq!(opts.checkpoint_path, Some(PathBuf::from("results/forbidden.json")));
        assert_eq!(opts.retry, RetryPolicy::unbounded());
    }
}
