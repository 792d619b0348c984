//! Blocking FIFO of pending download tasks with drain tracking.
//!
//! A task counts as outstanding from `enqueue` until `mark_resolved`, so a
//! task that was dequeued and put back with `requeue` keeps `await_drain`
//! waiting. Shutdown is signalled in-band with sentinels, one per worker.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::task::DownloadTask;

/// What a worker gets from [`TaskQueue::dequeue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Task(DownloadTask),
    Shutdown,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    outstanding: usize,
}

#[derive(Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    item_ready: Condvar,
    drained: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a new task; it stays outstanding until resolved.
    pub fn enqueue(&self, task: DownloadTask) {
        let mut state = self.lock();
        state.outstanding += 1;
        state.items.push_back(QueueItem::Task(task));
        drop(state);
        self.item_ready.notify_one();
    }

    /// Put a dequeued, unresolved task back at the tail.
    pub fn requeue(&self, task: DownloadTask) {
        let mut state = self.lock();
        state.items.push_back(QueueItem::Task(task));
        drop(state);
        self.item_ready.notify_one();
    }

    /// Append `n` shutdown sentinels.
    pub fn push_shutdown(&self, n: usize) {
        let mut state = self.lock();
        for _ in 0..n {
            state.items.push_back(QueueItem::Shutdown);
        }
        drop(state);
        self.item_ready.notify_all();
    }

    /// Block until a task or a sentinel is available.
    pub fn dequeue(&self) -> QueueItem {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            state = self
                .item_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Record that a dequeued task reached a terminal state.
    pub fn mark_resolved(&self) {
        let mut state = self.lock();
        if state.outstanding == 0 {
            tracing::warn!("mark_resolved with nothing outstanding");
            return;
        }
        state.outstanding -= 1;
        if state.outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Remove every queued task and resolve it without processing.
    /// Sentinels stay in place. Returns the abandoned tasks.
    pub fn abandon_pending(&self) -> Vec<DownloadTask> {
        let mut state = self.lock();
        let mut abandoned = Vec::new();
        let mut kept = VecDeque::new();
        for item in state.items.drain(..) {
            match item {
                QueueItem::Task(task) => abandoned.push(task),
                QueueItem::Shutdown => kept.push_back(QueueItem::Shutdown),
            }
        }
        state.items = kept;
        state.outstanding = state.outstanding.saturating_sub(abandoned.len());
        if state.outstanding == 0 {
            self.drained.notify_all();
        }
        abandoned
    }

    /// Block until every enqueued task has been resolved.
    pub fn await_drain(&self) {
        let mut state = self.lock();
        while state.outstanding > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Tasks enqueued and not yet resolved (queued or owned by a worker).
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Items currently waiting in the queue, sentinels included.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
