//! Error type for `affil-docstore`.

use affil_core::redact::redact;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("document store request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The store answered with a non-success status.
  #[error("document store returned {status}: {reason}")]
  Status { status: u16, reason: String },

  #[error("unexpected document store response: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Every document-store failure is internal to the caller; the message goes
/// through the redactor because URLs and bodies may carry credentials.
impl From<Error> for affil_core::Error {
  fn from(err: Error) -> Self { affil_core::Error::Internal(redact(&err.to_string())) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
