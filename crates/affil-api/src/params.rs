//! Extractors whose rejections render as [`ApiError`], and the query
//! parameters shared by several routes.

use affil_core::model::PageRequest;
use axum::extract::{FromRequest, FromRequestParts};
use serde::Deserialize;

use crate::error::ApiError;

/// `axum::Json` with a `{code, message}` rejection.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Query` with a `{code, message}` rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// `axum::extract::Path` with a `{code, message}` rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParams<T>(pub T);

/// `?q&rows&page`
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub q:    Option<String>,
  pub rows: Option<i64>,
  pub page: Option<i64>,
}

impl PageParams {
  pub fn request(self) -> PageRequest { PageRequest::new(self.q, self.rows, self.page) }
}

/// `?archive`, defaulting per route.
#[derive(Debug, Default, Deserialize)]
pub struct ArchiveParams {
  pub archive: Option<bool>,
}

impl ArchiveParams {
  pub fn or(&self, default: bool) -> bool { self.archive.unwrap_or(default) }
}

/// `?merge`
#[derive(Debug, Default, Deserialize)]
pub struct MergeParams {
  #[serde(default)]
  pub merge: bool,
}
