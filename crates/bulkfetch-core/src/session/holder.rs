//! Shared slot for the current session, guarded by one mutex and one condvar.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::Session;

/// Returned by [`SessionHolder::acquire`] once login has failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session is dead: login failed")]
pub struct SessionDead;

/// Observable state of the holder (no session payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Absent,
    Acquiring,
    Valid,
    Dead,
}

enum Slot {
    Absent,
    Acquiring,
    Valid(Arc<Session>),
    Dead,
}

struct HolderState {
    slot: Slot,
    renewal_requested: bool,
    stopped: bool,
    login_attempts: u32,
}

/// Single-flight mediator between workers and the renewal thread.
///
/// Workers call [`acquire`](Self::acquire) and
/// [`invalidate`](Self::invalidate); the renewal thread calls
/// [`wait_for_renewal_request`](Self::wait_for_renewal_request) followed by
/// [`publish`](Self::publish) or [`mark_dead`](Self::mark_dead).
pub struct SessionHolder {
    state: Mutex<HolderState>,
    changed: Condvar,
}

impl Default for SessionHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHolder {
    /// Empty holder; the first `acquire` requests a login.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HolderState {
                slot: Slot::Absent,
                renewal_requested: false,
                stopped: false,
                login_attempts: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Holder that starts out with a valid session.
    pub fn with_session(session: Session) -> Self {
        let holder = Self::new();
        holder.lock().slot = Slot::Valid(Arc::new(session));
        holder
    }

    fn lock(&self) -> MutexGuard<'_, HolderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, HolderState>) -> MutexGuard<'a, HolderState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a session is valid or login has failed.
    pub fn acquire(&self) -> Result<Arc<Session>, SessionDead> {
        let mut state = self.lock();
        loop {
            let absent = match &state.slot {
                Slot::Valid(session) => return Ok(Arc::clone(session)),
                Slot::Dead => return Err(SessionDead),
                Slot::Absent => true,
                Slot::Acquiring => false,
            };
            if absent {
                if state.stopped {
                    return Err(SessionDead);
                }
                if !state.renewal_requested {
                    state.renewal_requested = true;
                    self.changed.notify_all();
                }
            }
            state = self.wait(state);
        }
    }

    /// Drop `stale` and request a renewal, but only if it is still the
    /// current session. Returns true if the slot was cleared.
    pub fn invalidate(&self, stale: &Arc<Session>) -> bool {
        let mut state = self.lock();
        let current = matches!(&state.slot, Slot::Valid(s) if Arc::ptr_eq(s, stale));
        if !current {
            return false;
        }
        state.slot = Slot::Absent;
        state.renewal_requested = true;
        self.changed.notify_all();
        true
    }

    /// Renewal side: block until a worker asked for a session, then move to
    /// `Acquiring`. Returns false once the holder is stopped or dead.
    pub fn wait_for_renewal_request(&self) -> bool {
        let mut state = self.lock();
        loop {
            if state.stopped || matches!(state.slot, Slot::Dead) {
                return false;
            }
            if matches!(state.slot, Slot::Absent) && state.renewal_requested {
                state.slot = Slot::Acquiring;
                state.renewal_requested = false;
                state.login_attempts += 1;
                self.changed.notify_all();
                return true;
            }
            state = self.wait(state);
        }
    }

    /// Renewal side: install a fresh session and release every waiter.
    pub fn publish(&self, session: Session) {
        let mut state = self.lock();
        if matches!(state.slot, Slot::Dead) {
            return;
        }
        state.slot = Slot::Valid(Arc::new(session));
        self.changed.notify_all();
    }

    /// Renewal side: login failed; every current and future `acquire` fails.
    pub fn mark_dead(&self) {
        let mut state = self.lock();
        state.slot = Slot::Dead;
        self.changed.notify_all();
    }

    /// Release the renewal thread and any waiter at shutdown.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.stopped = true;
        self.changed.notify_all();
    }

    pub fn status(&self) -> SessionStatus {
        match self.lock().slot {
            Slot::Absent => SessionStatus::Absent,
            Slot::Acquiring => SessionStatus::Acquiring,
            Slot::Valid(_) => SessionStatus::Valid,
            Slot::Dead => SessionStatus::Dead,
        }
    }

    /// Number of Absent → Acquiring transitions so far.
    pub fn login_attempts(&self) -> u32 {
        self.lock().login_attempts
    }
}
