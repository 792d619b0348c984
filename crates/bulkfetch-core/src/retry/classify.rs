//! Classify HTTP status and transfer errors.

use super::error::TransferError;

/// What a response status means for the task that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx: body is the file.
    Success,
    /// 3xx: the server bounced us to its login page; the session is gone.
    SessionExpired,
    /// 4xx: this file is off limits for these credentials.
    Forbidden,
    /// Anything else (5xx, 1xx, garbage): try again later.
    Transient,
}

/// Classify an HTTP status code. Redirects are never followed, so a 3xx is
/// always the server's answer to a stale session.
pub fn classify_http_status(code: u32) -> StatusClass {
    match code {
        200..=299 => StatusClass::Success,
        300..=399 => StatusClass::SessionExpired,
        400..=499 => StatusClass::Forbidden,
        _ => StatusClass::Transient,
    }
}

/// Finer grain for transient failures; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Operation timed out (connect/read/low-speed).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Local disk problem while writing the body.
    Storage,
    Other,
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> FailureKind {
    if e.is_operation_timedout() {
        return FailureKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return FailureKind::Connection;
    }
    FailureKind::Other
}

/// Classify a transfer error.
pub fn classify(e: &TransferError) -> FailureKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Storage(_) => FailureKind::Storage,
    }
}
