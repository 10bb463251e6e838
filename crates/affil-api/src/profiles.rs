//! Handlers for profile endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/profiles` | `?q&rows&page`; `q=uuid=<uuid>` matches one uuid |
//! | `GET`    | `/profile/{uuid}` | 404 if not found |
//! | `POST`   | `/profile/{uuid}` | Body: [`ProfileInput`]; 409 if the uuid exists |
//! | `PUT`    | `/profile/{uuid}` | Body: [`ProfileInput`]; blank fields are kept |
//! | `DELETE` | `/profile/{uuid}` | `?archive` (default `true`) |
//! | `GET`    | `/profile/{uuid}/enrollments` | sorted by start, end, organization |
//! | `POST`   | `/unarchive_profile/{uuid}` | restores the newest checkpoint |

use affil_core::{
  model::{EnrollmentNested, Page, ProfileInput, UniqueIdentityNested},
  store::AffiliationStore,
};
use axum::{Json, extract::State, http::StatusCode};

use crate::{
  AppState, TextStatus,
  error::ApiError,
  params::{ArchiveParams, JsonBody, PageParams, PathParams, QueryParams},
};

/// `GET /profiles[?q&rows&page]`
pub async fn list<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<UniqueIdentityNested>>, ApiError> {
  let page = state.store.list_profiles(params.request()).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /profile/{uuid}`
pub async fn get_one<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(uuid): PathParams<String>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state.store.get_profile(uuid).await.map_err(ApiError::store)?;
  Ok(Json(uu))
}

/// `POST /profile/{uuid}`
pub async fn create<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(uuid): PathParams<String>,
  JsonBody(input): JsonBody<ProfileInput>,
) -> Result<(StatusCode, Json<UniqueIdentityNested>), ApiError> {
  let uu = state.store.add_profile(uuid, input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(uu)))
}

/// `PUT /profile/{uuid}`
pub async fn edit<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(uuid): PathParams<String>,
  JsonBody(input): JsonBody<ProfileInput>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state.store.edit_profile(uuid, input).await.map_err(ApiError::store)?;
  Ok(Json(uu))
}

/// `DELETE /profile/{uuid}[?archive]`
pub async fn remove<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(uuid): PathParams<String>,
  QueryParams(params): QueryParams<ArchiveParams>,
) -> Result<Json<TextStatus>, ApiError> {
  let archive = params.or(true);
  state.store.delete_profile(uuid.clone(), archive).await.map_err(ApiError::store)?;
  Ok(TextStatus::new(format!("Deleted profile '{uuid}' (archive: {archive})")))
}

/// `GET /profile/{uuid}/enrollments`
pub async fn enrollments<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(uuid): PathParams<String>,
) -> Result<Json<Vec<EnrollmentNested>>, ApiError> {
  let rows = state.store.profile_enrollments(uuid).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// `POST /unarchive_profile/{uuid}`
pub async fn unarchive<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(uuid): PathParams<String>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state.store.unarchive_profile(uuid).await.map_err(ApiError::store)?;
  Ok(Json(uu))
}
