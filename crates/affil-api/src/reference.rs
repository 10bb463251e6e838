//! Handlers for the matching blacklist and the countries table.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/matching_blacklist` | `?q&rows&page` |
//! | `POST`   | `/matching_blacklist` | Body: `{"email":"bot@example.com"}` |
//! | `DELETE` | `/matching_blacklist/{email}` | |
//! | `GET`    | `/countries` | |

use affil_core::{
  model::{Country, MatchingBlacklist, Page},
  store::AffiliationStore,
};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::{
  AppState, TextStatus,
  error::ApiError,
  params::{JsonBody, PageParams, PathParams, QueryParams},
};

#[derive(Debug, Deserialize)]
pub struct BlacklistBody {
  pub email: String,
}

/// `GET /matching_blacklist[?q&rows&page]`
pub async fn blacklist<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<MatchingBlacklist>>, ApiError> {
  let page = state
    .store
    .list_matching_blacklist(params.request())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /matching_blacklist`
pub async fn add_blacklist<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<BlacklistBody>,
) -> Result<(StatusCode, Json<MatchingBlacklist>), ApiError> {
  let entry = state.store.add_matching_blacklist(body.email).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(entry)))
}

/// `DELETE /matching_blacklist/{email}`
pub async fn remove_blacklist<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(email): PathParams<String>,
) -> Result<Json<TextStatus>, ApiError> {
  state.store.delete_matching_blacklist(email.clone()).await.map_err(ApiError::store)?;
  Ok(TextStatus::new(format!("Deleted blacklisted email '{email}'")))
}

/// `GET /countries`
pub async fn countries<S: AffiliationStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Country>>, ApiError> {
  let countries = state.store.list_countries().await.map_err(ApiError::store)?;
  Ok(Json(countries))
}
