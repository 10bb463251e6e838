//! Error types for `affil-core`.
//!
//! Every error carries an [`ErrorKind`] that the transport maps to an HTTP
//! status. Wrapping an error with [`Error::context`] keeps its kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The externally visible category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  BadRequest,
  Unauthorized,
  Forbidden,
  NotFound,
  Conflict,
  Internal,
}

impl ErrorKind {
  /// Wire code, e.g. `"404"`.
  pub fn code(self) -> &'static str {
    match self {
      ErrorKind::BadRequest => "400",
      ErrorKind::Unauthorized => "401",
      ErrorKind::Forbidden => "403",
      ErrorKind::NotFound => "404",
      ErrorKind::Conflict => "409",
      ErrorKind::Internal => "500",
    }
  }

  pub fn status(self) -> u16 {
    match self {
      ErrorKind::BadRequest => 400,
      ErrorKind::Unauthorized => 401,
      ErrorKind::Forbidden => 403,
      ErrorKind::NotFound => 404,
      ErrorKind::Conflict => 409,
      ErrorKind::Internal => 500,
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// Implemented by every error type that crosses a crate boundary, so the
/// transport can pick a status without knowing the concrete type.
pub trait Coded {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum Error {
  /// A field failed validation; `field` names the offending input.
  #[error("{field}: {message}")]
  Validation { field: &'static str, message: String },

  #[error("{0} not found")]
  NotFound(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  OutOfRange(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("{0}")]
  Internal(String),

  #[error("{context}: {source}")]
  Context {
    context: String,
    #[source]
    source:  Box<Error>,
  },
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Error::Validation { field, message: message.into() }
  }

  /// Wrap `self` with a message. The kind of the wrapped error is preserved.
  pub fn context(self, context: impl Into<String>) -> Self {
    Error::Context { context: context.into(), source: Box::new(self) }
  }
}

impl Coded for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Validation { .. } | Error::OutOfRange(_) | Error::BadRequest(_) => {
        ErrorKind::BadRequest
      }
      Error::NotFound(_) => ErrorKind::NotFound,
      Error::Conflict(_) => ErrorKind::Conflict,
      Error::Unauthorized(_) => ErrorKind::Unauthorized,
      Error::Forbidden(_) => ErrorKind::Forbidden,
      Error::Internal(_) => ErrorKind::Internal,
      Error::Context { source, .. } => source.kind(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn context_preserves_kind() {
    let err = Error::NotFound("profile 'x'".into())
      .context("merge_unique_identities")
      .context("PUT /merge_unique_identities");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
      err.to_string(),
      "PUT /merge_unique_identities: merge_unique_identities: profile 'x' not found"
    );
  }

  #[test]
  fn validation_names_field() {
    let err = Error::validation("gender_acc", "must be within [1, 100]");
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(err.to_string().starts_with("gender_acc:"));
  }

  #[test]
  fn wire_codes() {
    assert_eq!(ErrorKind::Conflict.code(), "409");
    assert_eq!(ErrorKind::Internal.status(), 500);
  }
}
