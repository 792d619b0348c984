//! In-process stand-in for a login-protected file site.
//!
//! Implements both `Authenticator` and `Transport`. Each login mints a new
//! token; a token can be made to expire after a number of successful
//! downloads, after which every request carrying it is redirected.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use bulkfetch_core::auth::{Authenticator, LoginError};
use bulkfetch_core::retry::TransferError;
use bulkfetch_core::session::Session;
use bulkfetch_core::task::{Credentials, DownloadTask, FileId};
use bulkfetch_core::transport::{ResponseSink, Transport};

use super::body_for;

pub const COOKIE: &str = "sid";

#[derive(Default)]
struct TokenState {
    generation: u32,
    served: u32,
}

#[derive(Default)]
pub struct FakeSite {
    forbidden: HashSet<FileId>,
    expire_after: Option<u32>,
    login_delay: Duration,
    request_delay: Duration,
    fail_logins_from: Option<u32>,
    flaky: Mutex<HashMap<FileId, u32>>,
    token: Mutex<TokenState>,
    requests: Mutex<HashMap<FileId, u32>>,
    logins_started: AtomicU32,
    in_login: AtomicUsize,
    max_in_login: AtomicUsize,
    redirects: AtomicU32,
    bytes_sent: Mutex<u64>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forbid(mut self, ids: &[FileId]) -> Self {
        self.forbidden.extend(ids.iter().copied());
        self
    }

    /// Each token is good for `n` successful downloads.
    pub fn expire_after(mut self, n: u32) -> Self {
        self.expire_after = Some(n);
        self
    }

    /// The `n`-th login (1-based) and every later one fail.
    pub fn fail_logins_from(mut self, n: u32) -> Self {
        self.fail_logins_from = Some(n);
        self
    }

    /// Answer 500 for `id` the first `times` requests.
    pub fn flaky(self, id: FileId, times: u32) -> Self {
        self.flaky.lock().unwrap().insert(id, times);
        self
    }

    pub fn login_delay(mut self, d: Duration) -> Self {
        self.login_delay = d;
        self
    }

    pub fn request_delay(mut self, d: Duration) -> Self {
        self.request_delay = d;
        self
    }

    pub fn logins_started(&self) -> u32 {
        self.logins_started.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_logins(&self) -> usize {
        self.max_in_login.load(Ordering::SeqCst)
    }

    pub fn redirects(&self) -> u32 {
        self.redirects.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, id: FileId) -> u32 {
        self.requests.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> u32 {
        self.requests.lock().unwrap().values().sum()
    }

    /// Bytes of bodies sent with a 2xx status.
    pub fn bytes_sent(&self) -> u64 {
        *self.bytes_sent.lock().unwrap()
    }

    fn status_for(&self, id: FileId, session: &Session) -> u32 {
        let mut token = self.token.lock().unwrap();
        let current = format!("tok{}", token.generation);
        let expired = self.expire_after.is_some_and(|n| token.served >= n);
        if token.generation == 0 || session.cookie(COOKIE) != Some(current.as_str()) || expired {
            self.redirects.fetch_add(1, Ordering::SeqCst);
            return 302;
        }
        if self.forbidden.contains(&id) {
            return 403;
        }
        if let Some(left) = self.flaky.lock().unwrap().get_mut(&id) {
            if *left > 0 {
                *left -= 1;
                return 500;
            }
        }
        token.served += 1;
        200
    }
}

impl Authenticator for FakeSite {
    fn login(&self, _credentials: &Credentials) -> Result<Session, LoginError> {
        let n = self.logins_started.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_login.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_login.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.login_delay);
        self.in_login.fetch_sub(1, Ordering::SeqCst);

        if self.fail_logins_from.is_some_and(|from| n >= from) {
            return Err(LoginError::Rejected("bad credentials".into()));
        }
        let mut token = self.token.lock().unwrap();
        token.generation += 1;
        token.served = 0;
        Ok(Session::new().with_cookie(COOKIE, format!("tok{}", token.generation)))
    }
}

fn id_from_url(url: &str) -> FileId {
    url.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap_or(-1)
}

impl Transport for FakeSite {
    fn get(&self, url: &str, session: &Session, sink: &mut dyn ResponseSink) -> Result<u32, TransferError> {
        thread::sleep(self.request_delay);
        let id = id_from_url(url);
        *self.requests.lock().unwrap().entry(id).or_insert(0) += 1;
        let status = self.status_for(id, session);
        let body = if status == 200 { body_for(id) } else { b"<html>nope</html>".to_vec() };
        sink.begin(status, None)?;
        let (a, b) = body.split_at(body.len() / 2);
        sink.data(a)?;
        sink.data(b)?;
        if status == 200 {
            *self.bytes_sent.lock().unwrap() += body.len() as u64;
        }
        Ok(status)
    }
}

pub fn tasks(dir: &std::path::Path, ids: impl IntoIterator<Item = FileId>) -> Vec<DownloadTask> {
    ids.into_iter()
        .map(|id| DownloadTask::new(format!("fake://site/file/{}", id), dir.join(format!("{}.txt", id)), id))
        .collect()
}
