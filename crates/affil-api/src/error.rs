//! API error type and [`axum::response::IntoResponse`] implementation.

use affil_core::{Coded, ErrorKind, redact::redact};
use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Rendered as `{"code": "<status>", "message": "..."}`; the message goes
/// through the secret redactor first.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
  pub kind:    ErrorKind,
  pub message: String,
}

impl ApiError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }

  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::BadRequest, message)
  }

  /// Lift any coded error, typically a store error.
  pub fn store<E: Coded + std::fmt::Display>(err: E) -> Self {
    Self::new(err.kind(), err.to_string())
  }
}

impl From<affil_core::Error> for ApiError {
  fn from(err: affil_core::Error) -> Self { Self::store(err) }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::bad_request(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::bad_request(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::bad_request(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status =
      StatusCode::from_u16(self.kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = redact(&self.message);
    if self.kind == ErrorKind::Internal {
      tracing::error!(%message, "request failed");
    } else {
      tracing::debug!(code = self.kind.code(), %message, "request rejected");
    }
    (status, Json(json!({ "code": self.kind.code(), "message": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use axum::body::to_bytes;

  use super::*;

  #[tokio::test]
  async fn envelope_carries_code_and_redacted_message() {
    affil_core::redact::register("hunter2-api");
    let err = ApiError::from(affil_core::Error::Internal("dial db:hunter2-api@x".into()));
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["code"], "500");
    assert_eq!(value["message"], "dial db:[redacted]@x");
  }

  #[test]
  fn kind_survives_context() {
    let err = ApiError::from(
      affil_core::Error::NotFound("profile 'u'".into()).context("GET /profile/u"),
    );
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "GET /profile/u: profile 'u' not found");
  }
}
