//! HTTP fetch used by the workers.
//!
//! The transport only reports what the server said (status, body). Turning a
//! status into "expired" / "forbidden" / "retry" is the worker's business.

mod content_disposition;
mod curl_transport;

pub use content_disposition::{disposition_extension, parse_content_disposition_filename};
pub(crate) use content_disposition::with_disposition_extension;
pub use curl_transport::{CurlTransport, TransportOptions};

use std::io;

use crate::retry::TransferError;
use crate::session::Session;

/// Receives one response. `begin` is called exactly once, before any `data`,
/// with the final status (redirects are not followed).
pub trait ResponseSink {
    fn begin(&mut self, status: u32, content_disposition: Option<&str>) -> io::Result<()>;
    fn data(&mut self, chunk: &[u8]) -> io::Result<()>;
}

/// Streaming GET with the session attached.
pub trait Transport: Send + Sync {
    /// Returns the response status once the body has been streamed into `sink`.
    fn get(&self, url: &str, session: &Session, sink: &mut dyn ResponseSink) -> Result<u32, TransferError>;
}
