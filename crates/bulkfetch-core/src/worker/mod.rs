//! Download workers: pull tasks, fetch them with the shared session, settle
//! each one as completed, skipped, forbidden, given up, or put it back.

mod attempt;
mod sink;

pub use attempt::{attempt_transfer, TransferOutcome};
pub use sink::{sweep_temp_files, temp_path, TEMP_SUFFIX};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::forbidden::ForbiddenSet;
use crate::progress::ProgressTracker;
use crate::queue::{QueueItem, TaskQueue};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::session::SessionHolder;
use crate::task::{DownloadTask, FileId};
use crate::transport::Transport;

/// Everything a worker shares with the rest of the pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<TaskQueue>,
    pub session: Arc<SessionHolder>,
    pub forbidden: ForbiddenSet,
    pub progress: Arc<ProgressTracker>,
    pub transport: Arc<dyn Transport>,
    pub overwrite: bool,
    pub retry: RetryPolicy,
    /// Transient failures per file, across the whole pool.
    attempts: Arc<Mutex<HashMap<FileId, u32>>>,
}

impl WorkerContext {
    pub fn new(
        queue: Arc<TaskQueue>,
        session: Arc<SessionHolder>,
        forbidden: ForbiddenSet,
        progress: Arc<ProgressTracker>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            queue,
            session,
            forbidden,
            progress,
            transport,
            overwrite: true,
            retry: RetryPolicy::default(),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn record_failure(&self, id: FileId) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let n = attempts.entry(id).or_insert(0);
        *n = n.saturating_add(1);
        *n
    }

    fn forget(&self, id: FileId) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn resolve(&self, task: &DownloadTask) {
        self.forget(task.file_id);
        self.queue.mark_resolved();
    }
}

/// Worker loop. Returns on a shutdown sentinel or once the session is dead.
pub fn run_worker(id: usize, ctx: &WorkerContext) {
    tracing::debug!(worker = id, "worker started");
    loop {
        let task = match ctx.queue.dequeue() {
            QueueItem::Task(task) => task,
            QueueItem::Shutdown => break,
        };

        let session = match ctx.session.acquire() {
            Ok(session) => session,
            Err(dead) => {
                tracing::debug!(worker = id, file_id = task.file_id, "{}; abandoning", dead);
                ctx.resolve(&task);
                let rest = ctx.queue.abandon_pending();
                ctx.progress.abandoned(1 + rest.len());
                break;
            }
        };

        ctx.progress.start(id, &task.dest);
        let on_bytes = |n: u64| ctx.progress.add_bytes(n);
        let outcome = attempt_transfer(&task, &session, ctx.transport.as_ref(), ctx.overwrite, &on_bytes);

        match outcome {
            TransferOutcome::Completed { path, bytes } => {
                ctx.progress.completed(id, &path, bytes);
                ctx.resolve(&task);
            }
            TransferOutcome::Skipped => {
                ctx.progress.skipped(id, &task.dest);
                ctx.resolve(&task);
            }
            TransferOutcome::Forbidden { status } => {
                ctx.forbidden.insert(task.file_id);
                ctx.progress.forbidden(id, &task.dest, status);
                ctx.resolve(&task);
            }
            TransferOutcome::SessionExpired { status } => {
                if ctx.session.invalidate(&session) {
                    tracing::info!(worker = id, status, "session expired, renewal requested");
                }
                ctx.progress.retrying(id, &task.dest, "session expired");
                ctx.queue.requeue(task);
            }
            TransferOutcome::Transient { reason } => {
                let attempt = ctx.record_failure(task.file_id);
                match ctx.retry.decide(attempt) {
                    RetryDecision::Requeue(delay) => {
                        ctx.progress.retrying(id, &task.dest, &reason);
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        ctx.queue.requeue(task);
                    }
                    RetryDecision::GiveUp => {
                        let reason = format!("{} (after {} attempts)", reason, attempt);
                        ctx.progress.gave_up(id, &task.dest, &reason);
                        ctx.resolve(&task);
                    }
                }
            }
        }
    }
    ctx.progress.worker_exited(id);
    tracing::debug!(worker = id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::TransferError;
    use crate::session::Session;
    use crate::transport::ResponseSink;
    use std::time::Duration;

    /// Serves `status` for every URL, except ids listed in `forbid`.
    struct ByStatus {
        status: u32,
        forbid: Vec<FileId>,
    }

    impl Transport for ByStatus {
        fn get(&self, url: &str, _s: &Session, sink: &mut dyn ResponseSink) -> Result<u32, TransferError> {
            let id: FileId = url.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let status = if self.forbid.contains(&id) { 403 } else { self.status };
            sink.begin(status, None)?;
            sink.data(b"data")?;
            Ok(status)
        }
    }

    fn setup(dir: &std::path::Path, transport: ByStatus, ids: &[FileId]) -> WorkerContext {
        let queue = Arc::new(TaskQueue::new());
        for &i in ids {
            queue.enqueue(DownloadTask::new(format!("http://h/{i}"), dir.join(format!("{i}.bin")), i));
        }
        let holder = Arc::new(SessionHolder::with_session(Session::new().with_cookie("sid", "1")));
        let progress = Arc::new(ProgressTracker::new(ids.len(), 1).without_rendering());
        WorkerContext::new(queue, holder, ForbiddenSet::new(), progress, Arc::new(transport))
    }

    #[test]
    fn completes_and_records_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), ByStatus { status: 200, forbid: vec![2] }, &[1, 2, 3]);
        ctx.queue.push_shutdown(1);
        run_worker(0, &ctx);
        assert_eq!(ctx.queue.outstanding(), 0);
        assert!(ctx.forbidden.contains(2));
        let c = ctx.progress.counts();
        assert_eq!((c.completed, c.forbidden), (2, 1));
        assert!(dir.path().join("1.bin").exists());
        assert!(!dir.path().join("2.bin").exists());
    }

    #[test]
    fn bounded_retry_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), ByStatus { status: 500, forbid: vec![] }, &[9])
            .with_retry(RetryPolicy::bounded(3, Duration::ZERO, Duration::ZERO));
        // Requeued tasks go to the tail, so the sentinel must come after the drain.
        let worker_ctx = ctx.clone();
        let handle = thread::spawn(move || run_worker(0, &worker_ctx));
        ctx.queue.await_drain();
        ctx.queue.push_shutdown(1);
        handle.join().unwrap();
        let c = ctx.progress.counts();
        assert_eq!(c.gave_up, 1);
        assert_eq!(c.retries, 2);
        assert_eq!(ctx.queue.outstanding(), 0);
        assert!(ctx.forbidden.is_empty());
    }

    #[test]
    fn dead_session_abandons_everything() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = setup(dir.path(), ByStatus { status: 200, forbid: vec![] }, &[1, 2, 3]);
        ctx.session.mark_dead();
        run_worker(0, &ctx);
        assert_eq!(ctx.queue.outstanding(), 0);
        assert_eq!(ctx.progress.counts().abandoned, 3);
    }
}
