use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::progress::{format_size, OutcomeCounts};
use crate::task::FileId;

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks handed to the run.
    pub total: usize,
    /// Forbidden ids after the run (initial ones included).
    pub forbidden: BTreeSet<FileId>,
    pub counts: OutcomeCounts,
    /// Bytes of the files that were completed.
    pub completed_bytes: u64,
    pub logins: u32,
    /// A login failed and the remaining tasks were abandoned.
    pub login_failed: bool,
    pub elapsed: Duration,
}

impl RunReport {
    /// Every task was either fetched, skipped or found forbidden.
    pub fn is_complete(&self) -> bool {
        !self.login_failed && self.counts.abandoned == 0 && self.counts.gave_up == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        write!(
            f,
            "{} of {} tasks resolved in {:.1}s: {} downloaded ({}), {} skipped, {} forbidden",
            c.resolved(),
            self.total,
            self.elapsed.as_secs_f64(),
            c.completed,
            format_size(self.completed_bytes as f64),
            c.skipped,
            c.forbidden,
        )?;
        if c.gave_up > 0 {
            write!(f, ", {} given up", c.gave_up)?;
        }
        if c.abandoned > 0 {
            write!(f, ", {} abandoned", c.abandoned)?;
        }
        write!(f, "; {} login(s)", self.logins)?;
        if self.login_failed {
            write!(f, ", last login failed")?;
        }
        Ok(())
    }
}
