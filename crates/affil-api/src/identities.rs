//! Handlers for identity endpoints and the merge/move engine.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/identity` | Body: [`NewIdentity`]; without `uuid` a profile is created |
//! | `POST`   | `/identities` | Body: `[NewIdentity]`, all or none |
//! | `GET`    | `/identity/{id}` | 404 if not found |
//! | `PUT`    | `/identity/{id}` | Body: [`IdentityUpdate`] |
//! | `DELETE` | `/identity/{id}` | `?archive` (default `true`) |
//! | `PUT`    | `/move_identity/{from_id}/{to_uuid}` | `?archive` (default `true`) |
//! | `PUT`    | `/merge_unique_identities/{from_uuid}/{to_uuid}` | `?archive` (default `true`) |

use affil_core::{
  model::{Identity, IdentityUpdate, NewIdentity, UniqueIdentityNested},
  store::AffiliationStore,
};
use axum::{Json, extract::State, http::StatusCode};

use crate::{
  AppState, TextStatus,
  error::ApiError,
  params::{ArchiveParams, JsonBody, PathParams, QueryParams},
};

/// `POST /identity`
pub async fn create<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  JsonBody(identity): JsonBody<NewIdentity>,
) -> Result<(StatusCode, Json<UniqueIdentityNested>), ApiError> {
  let uu = state.store.add_identity(identity).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(uu)))
}

/// `POST /identities`
pub async fn create_many<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  JsonBody(batch): JsonBody<Vec<NewIdentity>>,
) -> Result<(StatusCode, Json<Vec<UniqueIdentityNested>>), ApiError> {
  let uus = state.store.add_identities(batch).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(uus)))
}

/// `GET /identity/{id}`
pub async fn get_one<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<String>,
) -> Result<Json<Identity>, ApiError> {
  let identity = state.store.get_identity(id).await.map_err(ApiError::store)?;
  Ok(Json(identity))
}

/// `PUT /identity/{id}`
pub async fn edit<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<String>,
  JsonBody(update): JsonBody<IdentityUpdate>,
) -> Result<Json<Identity>, ApiError> {
  let identity = state.store.edit_identity(id, update).await.map_err(ApiError::store)?;
  Ok(Json(identity))
}

/// `DELETE /identity/{id}[?archive]`
pub async fn remove<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<String>,
  QueryParams(params): QueryParams<ArchiveParams>,
) -> Result<Json<TextStatus>, ApiError> {
  let archive = params.or(true);
  state.store.delete_identity(id.clone(), archive).await.map_err(ApiError::store)?;
  Ok(TextStatus::new(format!("Deleted identity '{id}' (archive: {archive})")))
}

/// `PUT /move_identity/{from_id}/{to_uuid}[?archive]`
pub async fn move_identity<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams((from_id, to_uuid)): PathParams<(String, String)>,
  QueryParams(params): QueryParams<ArchiveParams>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state
    .store
    .move_identity(from_id, to_uuid, params.or(true))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(uu))
}

/// `PUT /merge_unique_identities/{from_uuid}/{to_uuid}[?archive]`
pub async fn merge<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams((from_uuid, to_uuid)): PathParams<(String, String)>,
  QueryParams(params): QueryParams<ArchiveParams>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state
    .store
    .merge_unique_identities(from_uuid, to_uuid, params.or(true))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(uu))
}
