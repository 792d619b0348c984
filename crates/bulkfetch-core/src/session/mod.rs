//! Authenticated session and the single-flight holder that hands it out.
//!
//! Expiry is never known in advance: a worker notices it from a redirect,
//! invalidates the session it used, and blocks in `acquire` until the renewal
//! thread has logged in again. Any number of workers may notice at once; one
//! login runs per cycle and every waiter is released by the same broadcast.

mod holder;
mod renewal;

pub use holder::{SessionDead, SessionHolder, SessionStatus};
pub use renewal::{run_renewal_loop, RenewalStats};

use std::collections::BTreeMap;

/// Cookie bundle obtained from a login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: BTreeMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Cookie names only, for logs that must not leak values.
    pub fn cookie_names(&self) -> Vec<&str> {
        self.cookies.keys().map(String::as_str).collect()
    }

    /// Value for a `Cookie:` request header (`a=1; b=2`).
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
