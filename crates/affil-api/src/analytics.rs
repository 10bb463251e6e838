//! Contribution analytics and the full affiliation dump.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/unaffiliated/{slug}` | `?top&page` |
//! | `GET`  | `/top_contributors/{slug}` | `?from&to&limit&offset`, epoch millis, see below |
//! | `GET`  | `/top_contributors_csv/{slug}` | same, as `text/csv`, `limit` defaults to 10000 |
//! | `GET`  | `/all` | every complete profile, normalised |
//!
//! `{slug}` may be URL-encoded and may carry a leading `/projects/`.
//!
//! Top contributors also take `search` (see
//! [`ContributorSearch`](affil_core::analytics::ContributorSearch)),
//! `sort_field`, `sort_order` and a comma-separated `data_source`.

use affil_core::{
  ErrorKind,
  affiliations::AffiliationProfile,
  analytics::{
    CSV_TOP_LIMIT, ContributorStats, DEFAULT_TOP_LIMIT, MAX_TOP_LIMIT, TopContributorsQuery,
    UnaffiliatedContributor, normalize_slug,
  },
  remote::ContributionIndex,
  store::AffiliationStore,
};
use axum::{
  Json,
  extract::State,
  http::header,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::ApiError,
  params::{PathParams, QueryParams},
};

fn project(slug: &str) -> Result<&str, ApiError> {
  let slug = normalize_slug(slug);
  if slug.is_empty() {
    return Err(ApiError::bad_request("project slug cannot be empty"));
  }
  Ok(slug)
}

// ─── Unaffiliated ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UnaffiliatedParams {
  pub top:  Option<i64>,
  pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnaffiliatedOutput {
  pub unaffiliated: Vec<UnaffiliatedContributor>,
  pub page:         i64,
  pub rows:         i64,
}

/// Page `page` of `top` unaffiliated contributors.
///
/// The index also returns contributors that turn out to be affiliated or bots,
/// so the request grows until the filtered list covers the page, the index
/// runs dry or filtering stops yielding new rows.
pub async fn unaffiliated_page<S: AffiliationStore>(
  store: &S,
  index: &dyn ContributionIndex,
  slug: &str,
  top: i64,
  page: i64,
) -> Result<Vec<UnaffiliatedContributor>, ApiError> {
  let need = top.saturating_mul(page);
  let mut ask = need.saturating_add(5).saturating_mul(3);
  let mut previous: Option<usize> = None;

  let found = loop {
    let rows = index.unaffiliated(slug, ask).await?;
    let fetched = rows.len();
    let found = store.check_unaffiliated(rows).await.map_err(ApiError::store)?;
    tracing::debug!(slug, ask, fetched, kept = found.len(), "checked unaffiliated batch");

    let exhausted = (fetched as i64) < ask;
    let stalled = previous.is_some_and(|p| found.len() <= p);
    if found.len() as i64 >= need || exhausted || stalled {
      break found;
    }
    previous = Some(found.len());
    ask = ask.saturating_mul(2);
  };

  let start = usize::try_from((page - 1).saturating_mul(top)).unwrap_or(usize::MAX);
  Ok(found.into_iter().skip(start).take(top as usize).collect())
}

/// `GET /unaffiliated/{slug}[?top&page]`
pub async fn unaffiliated<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(slug): PathParams<String>,
  QueryParams(params): QueryParams<UnaffiliatedParams>,
) -> Result<Json<UnaffiliatedOutput>, ApiError> {
  let slug = project(&slug)?;
  let top = params.top.filter(|t| *t > 0).unwrap_or(DEFAULT_TOP_LIMIT).min(MAX_TOP_LIMIT);
  let page = params.page.unwrap_or(1).max(1);

  let unaffiliated =
    unaffiliated_page(state.store.as_ref(), state.index.as_ref(), slug, top, page).await?;
  tracing::info!(slug, top, page, found = unaffiliated.len(), "listed unaffiliated");
  Ok(Json(UnaffiliatedOutput { unaffiliated, page, rows: top }))
}

// ─── Top contributors ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TopContributorsParams {
  pub from:        Option<i64>,
  pub to:          Option<i64>,
  pub limit:       Option<i64>,
  pub offset:      Option<i64>,
  pub search:      Option<String>,
  pub sort_field:  Option<String>,
  pub sort_order:  Option<String>,
  /// Comma-separated data source types, `all` by default.
  pub data_source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TopContributorsOutput {
  pub contributors: Vec<ContributorStats>,
  pub from:         DateTime<Utc>,
  pub to:           DateTime<Utc>,
  pub limit:        i64,
  pub offset:       i64,
}

/// Fetch one ranked page and enrich it as of the end of the window.
async fn ranked<S: AffiliationStore>(
  state: &AppState<S>,
  slug: &str,
  params: TopContributorsParams,
) -> Result<(TopContributorsQuery, Vec<ContributorStats>), ApiError> {
  let slug = project(slug)?;
  let query =
    TopContributorsQuery::new(params.from, params.to, params.limit, params.offset, Utc::now())?
      .with_search(params.search.as_deref())
      .with_sort(params.sort_field.as_deref(), params.sort_order.as_deref())?
      .with_data_sources(params.data_source.as_deref());
  let rows = state.index.top_contributors(slug, &query).await?;
  let rows = state.store.enrich_contributors(rows, query.to).await.map_err(ApiError::store)?;
  tracing::info!(
    slug,
    from = %query.from,
    to = %query.to,
    limit = query.limit,
    offset = query.offset,
    searched = query.search.is_some(),
    data_sources = ?query.data_sources,
    found = rows.len(),
    "ranked top contributors"
  );
  Ok((query, rows))
}

/// `GET /top_contributors/{slug}[?from&to&limit&offset&search&sort_field&sort_order&data_source]`
pub async fn top_contributors<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(slug): PathParams<String>,
  QueryParams(params): QueryParams<TopContributorsParams>,
) -> Result<Json<TopContributorsOutput>, ApiError> {
  let (query, contributors) = ranked(&state, &slug, params).await?;
  Ok(Json(TopContributorsOutput {
    contributors,
    from: query.from,
    to: query.to,
    limit: query.limit,
    offset: query.offset,
  }))
}

pub const CSV_COLUMNS: [&str; 10] = [
  "uuid",
  "name",
  "email",
  "organization",
  "git_lines_added",
  "git_lines_changed",
  "git_lines_removed",
  "git_commits",
  "gerrit_approvals",
  "gerrit_merged_changesets",
];

/// Header row plus one row per contributor.
pub fn contributors_csv(rows: &[ContributorStats]) -> Result<Vec<u8>, ApiError> {
  let csv_error = |e: &dyn std::fmt::Display| ApiError::new(ErrorKind::Internal, e.to_string());

  let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
  writer.write_record(CSV_COLUMNS).map_err(|e| csv_error(&e))?;
  for row in rows {
    writer.serialize(row).map_err(|e| csv_error(&e))?;
  }
  writer.into_inner().map_err(|e| csv_error(&e))
}

/// `GET /top_contributors_csv/{slug}[?...]`, same parameters; the whole
/// ranking when no `limit` is given.
pub async fn top_contributors_csv<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  PathParams(slug): PathParams<String>,
  QueryParams(mut params): QueryParams<TopContributorsParams>,
) -> Result<Response, ApiError> {
  params.limit = params.limit.or(Some(CSV_TOP_LIMIT));
  let (_, rows) = ranked(&state, &slug, params).await?;
  let body = contributors_csv(&rows)?;
  Ok(
    (
      [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
        (header::CONTENT_DISPOSITION, "attachment; filename=\"top_contributors.csv\""),
      ],
      body,
    )
      .into_response(),
  )
}

// ─── Full dump ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AllOutput {
  pub profiles: Vec<AffiliationProfile>,
}

/// `GET /all`
pub async fn all<S: AffiliationStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<AllOutput>, ApiError> {
  let profiles = state.store.all_affiliations().await.map_err(ApiError::store)?;
  Ok(Json(AllOutput { profiles }))
}
