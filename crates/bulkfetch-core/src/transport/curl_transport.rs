//! libcurl-backed [`Transport`].

use std::cell::{Cell, RefCell};
use std::io;
use std::str;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::retry::TransferError;
use crate::session::Session;

use super::{ResponseSink, Transport};

/// Connection and stall limits applied to every transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// Abort if throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap so a completely stuck transfer eventually fails.
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl TransportOptions {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            timeout: Duration::from_secs(cfg.transfer_timeout_secs),
        }
    }
}

/// One fresh easy handle per request; handles are cheap next to the transfer.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: TransportOptions,
}

impl CurlTransport {
    pub fn new(options: TransportOptions) -> Self {
        Self { options }
    }
}

/// Status and the headers we care about, reset on every status line.
#[derive(Debug, Default)]
struct ResponseHead {
    status: u32,
    content_disposition: Option<String>,
}

impl ResponseHead {
    fn push_line(&mut self, raw: &[u8]) {
        let Ok(line) = str::from_utf8(raw) else {
            return;
        };
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            self.status = line
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse().ok())
                .unwrap_or(0);
            self.content_disposition = None;
        } else if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-disposition") {
                self.content_disposition = Some(value.trim().to_string());
            }
        }
    }
}

impl Transport for CurlTransport {
    fn get(&self, url: &str, session: &Session, sink: &mut dyn ResponseSink) -> Result<u32, TransferError> {
        let head = RefCell::new(ResponseHead::default());
        let begun = Cell::new(false);
        let sink_error: RefCell<Option<io::Error>> = RefCell::new(None);

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        // A redirect here means the session expired; the caller must see it.
        easy.follow_location(false)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(self.options.low_speed_limit)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        easy.timeout(self.options.timeout)?;
        let cookie = session.cookie_header();
        if !cookie.is_empty() {
            easy.cookie(&cookie)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.header_function(|line| {
                head.borrow_mut().push_line(line);
                true
            })?;
            transfer.write_function(|data| {
                if !begun.get() {
                    begun.set(true);
                    let h = head.borrow();
                    if let Err(e) = sink.begin(h.status, h.content_disposition.as_deref()) {
                        sink_error.borrow_mut().replace(e);
                        return Ok(0);
                    }
                }
                match sink.data(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        sink_error.borrow_mut().replace(e);
                        // Short count makes curl abort with a write error.
                        Ok(0)
                    }
                }
            })?;
            if let Err(e) = transfer.perform() {
                if e.is_write_error() {
                    if let Some(io_err) = sink_error.borrow_mut().take() {
                        return Err(TransferError::Storage(io_err));
                    }
                }
                return Err(TransferError::Curl(e));
            }
        }

        let status = easy.response_code()?;
        if !begun.get() {
            // Empty body: the sink still has to see the response.
            let h = head.borrow();
            sink.begin(status, h.content_disposition.as_deref())?;
        }
        Ok(status)
    }
}
