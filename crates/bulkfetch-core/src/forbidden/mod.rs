//! Files the server refused for these credentials.
//!
//! The set only grows during a run. It is saved as a JSON array next to the
//! downloads so the next run can skip those files up front.

mod checkpoint;
mod persist;

pub use checkpoint::run_checkpoint_loop;
pub use persist::{default_path, load_from_path, save_to_path, FORBIDDEN_FILE_NAME};

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::task::FileId;

/// Shared, grow-only set of forbidden file ids.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenSet {
    inner: Arc<Mutex<BTreeSet<FileId>>>,
}

impl ForbiddenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I: IntoIterator<Item = FileId>>(ids: I) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ids.into_iter().collect())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<FileId>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if the id was not already present.
    pub fn insert(&self, id: FileId) -> bool {
        self.lock().insert(id)
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Point-in-time copy, safe to serialize without holding the lock.
    pub fn snapshot(&self) -> BTreeSet<FileId> {
        self.lock().clone()
    }

    /// Final contents; other handles keep working on the same set.
    pub fn into_set(self) -> BTreeSet<FileId> {
        match Arc::try_unwrap(self.inner) {
            Ok(m) => m.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => Self { inner: shared }.snapshot(),
        }
    }
}
