//! Handlers for enrollments.
//!
//! Dates are accepted as RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/enrollment` | Body: [`EnrollmentBody`]; `?merge` collapses overlaps |
//! | `PUT`    | `/enrollment/{id}` | Body: [`EnrollmentEditBody`]; `?merge` |
//! | `DELETE` | `/enrollment/{id}` | `?archive` (default `false`) |
//! | `DELETE` | `/enrollments/{uuid}/{org_id}` | every enrollment in one organization |
//! | `PUT`    | `/merge_enrollments/{uuid}/{org_id}` | |

use affil_core::{
  Result,
  dates::parse_field,
  model::{EnrollmentUpdate, NewEnrollment, UniqueIdentityNested},
  store::AffiliationStore,
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  params::{ArchiveParams, JsonBody, MergeParams, PathParams, QueryParams},
};

#[derive(Debug, Deserialize)]
pub struct EnrollmentBody {
  pub uuid:            String,
  pub organization_id: i64,
  #[serde(default)]
  pub start:           Option<String>,
  #[serde(default)]
  pub end:             Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnrollmentEditBody {
  pub organization_id: Option<i64>,
  pub start:           Option<String>,
  pub end:             Option<String>,
}

/// Blank means "not given".
fn optional_date(field: &'static str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  match value.map(str::trim).filter(|v| !v.is_empty()) {
    Some(v) => parse_field(field, v).map(Some),
    None => Ok(None),
  }
}

impl EnrollmentBody {
  fn into_new(self) -> Result<NewEnrollment> {
    Ok(NewEnrollment {
      start:           optional_date("start", self.start.as_deref())?,
      end:             optional_date("end", self.end.as_deref())?,
      uuid:            self.uuid,
      organization_id: self.organization_id,
    })
  }
}

impl EnrollmentEditBody {
  fn into_update(self) -> Result<EnrollmentUpdate> {
    Ok(EnrollmentUpdate {
      organization_id: self.organization_id,
      start:           optional_date("start", self.start.as_deref())?,
      end:             optional_date("end", self.end.as_deref())?,
    })
  }
}

/// `POST /enrollment[?merge]`
pub async fn create<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<MergeParams>,
  JsonBody(body): JsonBody<EnrollmentBody>,
) -> Result<(StatusCode, Json<UniqueIdentityNested>), ApiError> {
  let enrollment = body.into_new()?;
  let uu = state
    .store
    .add_enrollment(enrollment, params.merge)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(uu)))
}

/// `PUT /enrollment/{id}[?merge]`
pub async fn edit<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<i64>,
  QueryParams(params): QueryParams<MergeParams>,
  JsonBody(body): JsonBody<EnrollmentEditBody>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let update = body.into_update()?;
  let uu = state
    .store
    .edit_enrollment(id, update, params.merge)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(uu))
}

/// `DELETE /enrollment/{id}[?archive]`
pub async fn remove<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<i64>,
  QueryParams(params): QueryParams<ArchiveParams>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state
    .store
    .delete_enrollment(id, params.or(false))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(uu))
}

/// `DELETE /enrollments/{uuid}/{org_id}`
pub async fn remove_all<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams((uuid, org_id)): PathParams<(String, i64)>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state.store.delete_enrollments(uuid, org_id).await.map_err(ApiError::store)?;
  Ok(Json(uu))
}

/// `PUT /merge_enrollments/{uuid}/{org_id}`
pub async fn merge<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams((uuid, org_id)): PathParams<(String, i64)>,
) -> Result<Json<UniqueIdentityNested>, ApiError> {
  let uu = state.store.merge_enrollments(uuid, org_id).await.map_err(ApiError::store)?;
  Ok(Json(uu))
}

#[cfg(test)]
mod tests {
  use affil_core::{Coded, ErrorKind};

  use super::*;

  #[test]
  fn blank_dates_fall_back_to_defaults() {
    let body = EnrollmentBody {
      uuid:            "u1".into(),
      organization_id: 3,
      start:           Some("2012-08-01".into()),
      end:             Some("  ".into()),
    };
    let new = body.into_new().unwrap();
    assert_eq!(new.start.unwrap().to_rfc3339(), "2012-08-01T00:00:00+00:00");
    assert!(new.end.is_none());
  }

  #[test]
  fn unparsable_date_names_the_field() {
    let body = EnrollmentEditBody { end: Some("yesterday".into()), ..Default::default() };
    let err = body.into_update().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(err.to_string().starts_with("end:"));
  }
}
