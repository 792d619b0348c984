//! One download attempt, reduced to a [`TransferOutcome`].

use std::path::PathBuf;

use crate::retry::{classify, classify_http_status, StatusClass};
use crate::session::Session;
use crate::task::DownloadTask;
use crate::transport::Transport;

use super::sink::FileSink;

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Body saved at `path` (which may carry an extension taken from the response).
    Completed { path: PathBuf, bytes: u64 },
    /// Destination already present and overwriting is off.
    Skipped,
    /// 4xx: this file is not available to these credentials.
    Forbidden { status: u32 },
    /// 3xx: the session is no longer accepted.
    SessionExpired { status: u32 },
    /// Anything worth trying again.
    Transient { reason: String },
}

impl TransferOutcome {
    /// True if the task is done with, one way or another.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::SessionExpired { .. } | Self::Transient { .. })
    }
}

/// Fetch `task` with `session` and save the body.
pub fn attempt_transfer(
    task: &DownloadTask,
    session: &Session,
    transport: &dyn Transport,
    overwrite: bool,
    on_bytes: &dyn Fn(u64),
) -> TransferOutcome {
    if !overwrite && task.dest.exists() {
        return TransferOutcome::Skipped;
    }

    let mut sink = FileSink::new(&task.dest, on_bytes);
    let status = match transport.get(&task.url, session, &mut sink) {
        Ok(status) => status,
        Err(e) => {
            return TransferOutcome::Transient {
                reason: format!("{:?}: {}", classify(&e), e),
            }
        }
    };

    match classify_http_status(status) {
        StatusClass::Success => match sink.finish() {
            Ok(Some((path, bytes))) => TransferOutcome::Completed { path, bytes },
            Ok(None) => TransferOutcome::Transient {
                reason: format!("HTTP {} without a response body", status),
            },
            Err(e) => TransferOutcome::Transient {
                reason: format!("Storage: {}", e),
            },
        },
        StatusClass::SessionExpired => TransferOutcome::SessionExpired { status },
        StatusClass::Forbidden => TransferOutcome::Forbidden { status },
        StatusClass::Transient => TransferOutcome::Transient {
            reason: format!("HTTP {}", status),
        },
    }
}
