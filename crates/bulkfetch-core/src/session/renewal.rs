//! Dedicated login thread: the only place a login exchange ever runs.

use crate::auth::Authenticator;
use crate::progress::ProgressTracker;
use crate::queue::TaskQueue;
use crate::task::Credentials;

use super::SessionHolder;

/// What the renewal loop did over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalStats {
    /// Successful logins (the first one included).
    pub logins: u32,
    /// True if a login failed and the run was abandoned.
    pub failed: bool,
}

/// Serve renewal requests until the holder is stopped or a login fails.
///
/// On failure the holder goes `Dead` and every task still queued is resolved
/// as abandoned so the orchestrator's drain wait completes.
pub fn run_renewal_loop(
    holder: &SessionHolder,
    authenticator: &dyn Authenticator,
    credentials: &Credentials,
    queue: &TaskQueue,
    progress: &ProgressTracker,
) -> RenewalStats {
    let mut stats = RenewalStats::default();
    while holder.wait_for_renewal_request() {
        let result = {
            let _quiet = progress.silence();
            tracing::info!(user = %credentials.username, "logging in");
            authenticator.login(credentials)
        };
        match result {
            Ok(session) => {
                stats.logins += 1;
                tracing::info!(logins = stats.logins, "login successful");
                holder.publish(session);
            }
            Err(e) => {
                tracing::error!("login failed: {}", e);
                stats.failed = true;
                holder.mark_dead();
                let abandoned = queue.abandon_pending();
                if !abandoned.is_empty() {
                    tracing::warn!(count = abandoned.len(), "abandoning queued tasks after login failure");
                }
                progress.abandoned(abandoned.len());
                break;
            }
        }
    }
    stats
}
