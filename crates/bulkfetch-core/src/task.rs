//! Download tasks and the credentials used to fetch them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identifier of a remote file. Survives retries and runs; this is what
/// the forbidden set stores.
pub type FileId = i64;

/// One file to fetch. Never mutated after creation; a retry re-enqueues the
/// same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    pub file_id: FileId,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, file_id: FileId) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            file_id,
        }
    }
}

/// Username/password pair handed to the authenticator.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
