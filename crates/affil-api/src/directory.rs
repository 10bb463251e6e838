//! Pass-through searches of the external directories.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/directory/organizations` | `?q&rows&page`; exact name match first |
//! | `GET`  | `/directory/users` | `?q&rows&page` |

use affil_core::{
  remote::{DirectoryOrganization, DirectoryUser},
  store::AffiliationStore,
};
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{
  AppState,
  error::ApiError,
  params::{PageParams, QueryParams},
};

#[derive(Debug, Serialize)]
pub struct OrganizationsOutput {
  pub organizations: Vec<DirectoryOrganization>,
  pub page:          i64,
  pub rows:          i64,
}

#[derive(Debug, Serialize)]
pub struct UsersOutput {
  pub users: Vec<DirectoryUser>,
  pub page:  i64,
  pub rows:  i64,
}

/// `GET /directory/organizations[?q&rows&page]`
pub async fn organizations<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<OrganizationsOutput>, ApiError> {
  let req = params.request();
  let q = req.q.clone().unwrap_or_default();

  let mut organizations = Vec::new();
  if !q.is_empty() && req.page == 1 {
    organizations.extend(state.orgs.lookup_organization(&q).await?);
  }
  for org in state.orgs.search_organizations(&q, req.rows, req.page).await? {
    if !organizations.iter().any(|o: &DirectoryOrganization| o.id == org.id) {
      organizations.push(org);
    }
  }
  Ok(Json(OrganizationsOutput { organizations, page: req.page, rows: req.rows }))
}

/// `GET /directory/users[?q&rows&page]`
pub async fn users<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<UsersOutput>, ApiError> {
  let req = params.request();
  let q = req.q.clone().unwrap_or_default();
  let users = state.users.list_users(&q, req.rows, req.page).await?;
  Ok(Json(UsersOutput { users, page: req.page, rows: req.rows }))
}
