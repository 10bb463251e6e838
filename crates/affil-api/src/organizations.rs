//! Handlers for organizations and their domains.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/organizations` | `?q&rows&page`; each with its domains |
//! | `POST`   | `/organization` | Body: `{"name":"Acme"}`; 409 on a taken name |
//! | `GET`    | `/organization/{id}` | 404 if not found |
//! | `PUT`    | `/organization/{id}` | Body: `{"name":"Acme Corp"}` |
//! | `DELETE` | `/organization/{id}` | domains and enrollments cascade |
//! | `GET`    | `/organization_by_name/{name}` | exact match |
//! | `PUT`    | `/org_domain/{org}/{domain}` | `?overwrite&top&skip_enrollments` |
//! | `DELETE` | `/org_domain/{org}/{domain}` | 404 if not bound |
//! | `GET`    | `/domains` | `?org_id&q&rows&page` |

use affil_core::{
  model::{
    Domain, Organization, OrganizationNested, Page, PageRequest, PutOrgDomainOptions,
    PutOrgDomainOutput,
  },
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
pub struct OrganizationBody {
  pub name: String,
}

// ─── Organizations ────────────────────────────────────────────────────────────

/// `GET /organizations[?q&rows&page]`
pub async fn list<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Page<OrganizationNested>>, ApiError> {
  let page = state.store.list_organizations(params.request()).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /organization`
pub async fn create<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<OrganizationBody>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
  let org = state.store.add_organization(body.name).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(org)))
}

/// `GET /organization/{id}`
pub async fn get_one<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<i64>,
) -> Result<Json<Organization>, ApiError> {
  let org = state.store.get_organization(id).await.map_err(ApiError::store)?;
  Ok(Json(org))
}

/// `GET /organization_by_name/{name}`
pub async fn by_name<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(name): PathParams<String>,
) -> Result<Json<Organization>, ApiError> {
  let org = state.store.find_organization_by_name(name).await.map_err(ApiError::store)?;
  Ok(Json(org))
}

/// `PUT /organization/{id}`
pub async fn edit<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<i64>,
  JsonBody(body): JsonBody<OrganizationBody>,
) -> Result<Json<Organization>, ApiError> {
  let org = state.store.edit_organization(id, body.name).await.map_err(ApiError::store)?;
  Ok(Json(org))
}

/// `DELETE /organization/{id}`
pub async fn remove<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<i64>,
) -> Result<Json<TextStatus>, ApiError> {
  state.store.delete_organization(id).await.map_err(ApiError::store)?;
  Ok(TextStatus::new(format!("Deleted organization {id}")))
}

// ─── Domains ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PutDomainParams {
  #[serde(default)]
  pub overwrite:        bool,
  #[serde(default)]
  pub top:              bool,
  #[serde(default)]
  pub skip_enrollments: bool,
}

/// `PUT /org_domain/{org}/{domain}[?overwrite&top&skip_enrollments]`
pub async fn put_domain<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams((org, domain)): PathParams<(String, String)>,
  QueryParams(params): QueryParams<PutDomainParams>,
) -> Result<Json<PutOrgDomainOutput>, ApiError> {
  let options = PutOrgDomainOptions {
    overwrite:        params.overwrite,
    is_top_domain:    params.top,
    skip_enrollments: params.skip_enrollments,
  };
  let out = state.store.put_org_domain(org, domain, options).await.map_err(ApiError::store)?;
  Ok(Json(out))
}

/// `DELETE /org_domain/{org}/{domain}`
pub async fn delete_domain<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams((org, domain)): PathParams<(String, String)>,
) -> Result<Json<TextStatus>, ApiError> {
  state
    .store
    .delete_org_domain(org.clone(), domain.clone())
    .await
    .map_err(ApiError::store)?;
  Ok(TextStatus::new(format!("Deleted domain '{domain}' of organization '{org}'")))
}

#[derive(Debug, Default, Deserialize)]
pub struct DomainParams {
  pub org_id: Option<i64>,
  pub q:      Option<String>,
  pub rows:   Option<i64>,
  pub page:   Option<i64>,
}

/// `GET /domains[?org_id&q&rows&page]`
pub async fn domains<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<DomainParams>,
) -> Result<Json<Page<Domain>>, ApiError> {
  let page = PageRequest::new(params.q, params.rows, params.page);
  let out = state.store.list_domains(params.org_id, page).await.map_err(ApiError::store)?;
  Ok(Json(out))
}
