//! Error type for `affil-store-sqlite`.

use affil_core::{Coded, ErrorKind, redact::redact};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] affil_core::Error),

  /// A database failure. The message has been passed through the redactor.
  #[error("database error: {message}")]
  Database { message: String, conflict: bool },

  #[error("decode error: {0}")]
  Decode(String),

  /// The caller went away before the operation committed.
  #[error("operation cancelled")]
  Cancelled,

  #[error("{context}: {source}")]
  Context {
    context: String,
    #[source]
    source:  Box<Error>,
  },
}

impl Error {
  /// Wrap `self` with a message; the kind is preserved.
  pub fn context(self, context: impl Into<String>) -> Self {
    Error::Context { context: context.into(), source: Box::new(self) }
  }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    Error::Database { conflict: is_unique_violation(&err), message: redact(&err.to_string()) }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Rusqlite(e) => e.into(),
      other => Error::Database { conflict: false, message: redact(&other.to_string()) },
    }
  }
}

impl Coded for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database { conflict: true, .. } => ErrorKind::Conflict,
      Error::Database { .. } | Error::Decode(_) | Error::Cancelled => ErrorKind::Internal,
      Error::Context { source, .. } => source.kind(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
