//! Failure classification and retry policy.
//!
//! Maps HTTP status codes and transfer errors onto the outcome taxonomy the
//! workers act on (session expired, forbidden, transient) and decides whether
//! a transient failure is requeued, and after how long.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status, FailureKind, StatusClass};
pub use error::TransferError;
pub use policy::{RetryDecision, RetryPolicy};
