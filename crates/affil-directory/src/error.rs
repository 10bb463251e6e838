//! Error type for `affil-directory`.

use affil_core::redact::redact;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("directory request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("directory returned {status}: {body}")]
  Status { status: u16, body: String },
}

impl From<Error> for affil_core::Error {
  fn from(err: Error) -> Self {
    let message = redact(&err.to_string());
    match err {
      Error::Status { status: 401, .. } => affil_core::Error::Unauthorized(message),
      Error::Status { status: 403, .. } => affil_core::Error::Forbidden(message),
      _ => affil_core::Error::Internal(message),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
