//! Login exchange: credentials in, cookie session out.

mod form;
mod hidden;

pub use form::FormLogin;
pub use hidden::{hidden_inputs, unescape_html};

use thiserror::Error;

use crate::session::Session;
use crate::task::Credentials;

/// Why a login did not yield a session. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The exchange completed but the server did not hand out a session
    /// (wrong credentials, changed login page, ...).
    #[error("login rejected: {0}")]
    Rejected(String),
    /// A login step answered with an error status.
    #[error("login step failed with HTTP {0}")]
    Http(u32),
    /// Network-level failure during the exchange.
    #[error("login transport: {0}")]
    Transport(#[from] curl::Error),
}

/// Performs the login exchange. Called only from the renewal thread.
pub trait Authenticator: Send + Sync {
    fn login(&self, credentials: &Credentials) -> Result<Session, LoginError>;
}
