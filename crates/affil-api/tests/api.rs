//! Drive the router end to end over an in-memory store and stub remotes.

use std::sync::{Arc, Mutex};

use affil_api::{AppState, api_router};
use affil_core::{
  Result,
  analytics::{
    Contribution, ContributorStats, MAX_TOP_LIMIT, SortField, SortOrder, TopContributorsQuery,
  },
  remote::{
    ContributionIndex, DirectoryOrganization, DirectoryUser, OrganizationDirectory,
    UserDirectory,
  },
};
use affil_store_sqlite::SqliteStore;
use async_trait::async_trait;
use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

// ─── Stubs ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StubIndex {
  unaffiliated: Vec<Contribution>,
  top:          Vec<ContributorStats>,
  asks:         Mutex<Vec<(String, i64)>>,
  queries:      Mutex<Vec<TopContributorsQuery>>,
}

#[async_trait]
impl ContributionIndex for StubIndex {
  async fn unaffiliated(&self, project_slug: &str, top_n: i64) -> Result<Vec<Contribution>> {
    self.asks.lock().unwrap().push((project_slug.to_owned(), top_n));
    Ok(self.unaffiliated.iter().take(top_n as usize).cloned().collect())
  }

  async fn top_contributors(
    &self,
    _project_slug: &str,
    query: &TopContributorsQuery,
  ) -> Result<Vec<ContributorStats>> {
    self.queries.lock().unwrap().push(query.clone());
    Ok(self.top.clone())
  }
}

struct StubOrgs;

#[async_trait]
impl OrganizationDirectory for StubOrgs {
  async fn lookup_organization(&self, name: &str) -> Result<Option<DirectoryOrganization>> {
    Ok((name == "Acme").then(|| dir_org("1", "Acme")))
  }

  async fn search_organizations(
    &self,
    _q: &str,
    _rows: i64,
    _page: i64,
  ) -> Result<Vec<DirectoryOrganization>> {
    Ok(vec![dir_org("2", "Acme Labs"), dir_org("1", "Acme")])
  }
}

struct StubUsers;

#[async_trait]
impl UserDirectory for StubUsers {
  async fn list_users(&self, q: &str, _rows: i64, _page: i64) -> Result<Vec<DirectoryUser>> {
    Ok(vec![DirectoryUser {
      id:       "u-1".into(),
      name:     Some(q.to_owned()),
      email:    None,
      username: None,
    }])
  }
}

fn dir_org(id: &str, name: &str) -> DirectoryOrganization {
  DirectoryOrganization { id: id.into(), name: name.into(), link: None }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

async fn app_with(index: Arc<StubIndex>) -> Router {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  api_router(AppState {
    store: Arc::new(store),
    index,
    orgs: Arc::new(StubOrgs),
    users: Arc::new(StubUsers),
  })
}

async fn app() -> Router { app_with(Arc::new(StubIndex::default())).await }

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let (status, _, bytes) = send_raw(app, method, uri, body).await;
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

async fn send_raw(
  app: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, String, Vec<u8>) {
  let mut req = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      req = req.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let content_type = resp
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_owned();
  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, content_type, bytes.to_vec())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_running() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/health", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["affiliation_service"], "Running");
  assert!(body["date_time"].is_string());
}

#[tokio::test]
async fn profile_lifecycle() {
  let app = app().await;
  let jane = json!({ "name": "Jane", "email": "jane@acme.com" });

  let (status, body) = send(&app, "POST", "/profile/u1", Some(jane.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["uuid"], "u1");
  assert_eq!(body["profile"]["email"], "jane@acme.com");

  let (status, body) = send(&app, "POST", "/profile/u1", Some(jane)).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], "409");

  let (status, body) =
    send(&app, "PUT", "/profile/u1", Some(json!({ "name": "Jane Roe", "email": "" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["profile"]["name"], "Jane Roe");
  assert_eq!(body["profile"]["email"], "jane@acme.com");

  let (_, body) = send(&app, "GET", "/profiles?q=uuid%3Du1", None).await;
  assert_eq!(body["n_records"], 1);

  let (status, _) = send(&app, "DELETE", "/profile/u1", None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, body) = send(&app, "GET", "/profile/u1", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "404");

  let (status, body) = send(&app, "POST", "/unarchive_profile/u1", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["profile"]["name"], "Jane Roe");
}

#[tokio::test]
async fn identity_without_uuid_creates_its_profile() {
  let app = app().await;
  let (status, body) =
    send(&app, "POST", "/identity", Some(json!({ "source": "git", "email": "kim@initech.com" })))
      .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = body["identities"][0]["id"].as_str().unwrap().to_owned();
  assert_eq!(body["uuid"], id.as_str());
  assert_eq!(body["profile"]["email"], "kim@initech.com");

  let (status, body) = send(&app, "GET", &format!("/identity/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["source"], "git");

  let (status, body) = send(&app, "POST", "/identity", Some(json!({ "source": "git" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "400");
}

#[tokio::test]
async fn org_domain_enrolls_matching_profiles() {
  let app = app().await;
  let (status, org) = send(&app, "POST", "/organization", Some(json!({ "name": "Acme" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  let org_id = org["id"].as_i64().unwrap();
  send(&app, "POST", "/profile/u1", Some(json!({ "email": "jane@acme.com" }))).await;

  let (status, out) = send(&app, "PUT", "/org_domain/Acme/acme.com?top=true", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(out["added"], 1);
  assert_eq!(out["domain"]["is_top_domain"], true);

  let (_, rows) = send(&app, "GET", "/profile/u1/enrollments", None).await;
  assert_eq!(rows[0]["organization"]["name"], "Acme");

  let (_, page) = send(&app, "GET", &format!("/domains?org_id={org_id}"), None).await;
  assert_eq!(page["n_records"], 1);

  let (status, _) = send(&app, "DELETE", "/org_domain/Acme/acme.com", None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = send(&app, "DELETE", "/org_domain/Acme/acme.com", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
  let app = app().await;
  send(&app, "POST", "/profile/u1", Some(json!({ "name": "Jane" }))).await;
  let (_, org) = send(&app, "POST", "/organization", Some(json!({ "name": "Acme" }))).await;

  let body = json!({ "uuid": "u1", "organization_id": org["id"], "start": "last spring" });
  let (status, err) = send(&app, "POST", "/enrollment", Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["message"].as_str().unwrap().starts_with("start:"));

  let (status, err) = send(&app, "POST", "/organization", Some(json!({ "nom": "x" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(err["code"], "400");

  let (status, _) = send(&app, "GET", "/organization/abc", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enrollment_merge_collapses_overlaps() {
  let app = app().await;
  send(&app, "POST", "/profile/u1", Some(json!({ "name": "Jane" }))).await;
  let (_, org) = send(&app, "POST", "/organization", Some(json!({ "name": "Acme" }))).await;
  let org_id = org["id"].as_i64().unwrap();

  let first = json!({ "uuid": "u1", "organization_id": org_id,
    "start": "2010-01-01", "end": "2012-01-01" });
  let second = json!({ "uuid": "u1", "organization_id": org_id,
    "start": "2011-06-01", "end": "2014-01-01" });
  let (status, _) = send(&app, "POST", "/enrollment", Some(first)).await;
  assert_eq!(status, StatusCode::CREATED);
  let (_, uu) = send(&app, "POST", "/enrollment?merge=true", Some(second)).await;

  let enrollments = uu["enrollments"].as_array().unwrap();
  assert_eq!(enrollments.len(), 1);
  assert!(enrollments[0]["start"].as_str().unwrap().starts_with("2010-01-01"));
  assert!(enrollments[0]["end"].as_str().unwrap().starts_with("2014-01-01"));
}

#[tokio::test]
async fn unaffiliated_grows_the_request_until_the_page_is_covered() {
  // 30 buckets, only the last two belong to known profiles.
  let mut rows: Vec<_> = (0..28)
    .map(|i| Contribution { uuid: format!("stranger-{i}"), contributions: 100 - i })
    .collect();
  rows.push(Contribution { uuid: "alice".into(), contributions: 5 });
  rows.push(Contribution { uuid: "bob".into(), contributions: 3 });
  let index = Arc::new(StubIndex { unaffiliated: rows, ..Default::default() });
  let app = app_with(index.clone()).await;
  send(&app, "POST", "/profile/alice", Some(json!({ "name": "Alice" }))).await;
  send(&app, "POST", "/profile/bob", Some(json!({ "name": "Bob" }))).await;

  let (status, body) =
    send(&app, "GET", "/unaffiliated/%2Fprojects%2Fcncf%2Fk8s?top=1&page=2", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["unaffiliated"].as_array().unwrap().len(), 1);
  assert_eq!(body["unaffiliated"][0]["uuid"], "bob");
  assert_eq!(body["unaffiliated"][0]["name"], "Bob");

  let asks = index.asks.lock().unwrap().clone();
  assert_eq!(asks, [("cncf/k8s".to_owned(), 21), ("cncf/k8s".to_owned(), 42)]);
}

#[tokio::test]
async fn top_contributors_are_enriched() {
  let index = Arc::new(StubIndex {
    top: vec![ContributorStats { uuid: "u1".into(), git_commits: 3, ..Default::default() }],
    ..Default::default()
  });
  let app = app_with(index).await;
  send(&app, "POST", "/profile/u1", Some(json!({ "name": "Jane", "email": "jane@acme.com" })))
    .await;
  let (_, org) = send(&app, "POST", "/organization", Some(json!({ "name": "Acme" }))).await;
  send(&app, "POST", "/enrollment", Some(json!({ "uuid": "u1", "organization_id": org["id"] })))
    .await;

  let (status, body) = send(&app, "GET", "/top_contributors/lfn", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["limit"], 10);
  assert_eq!(body["contributors"][0]["name"], "Jane");
  assert_eq!(body["contributors"][0]["organization"], "Acme");
  assert_eq!(body["contributors"][0]["git_commits"], 3);

  let (status, content_type, csv) = send_raw(&app, "GET", "/top_contributors_csv/lfn", None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(content_type.starts_with("text/csv"));
  let csv = String::from_utf8(csv).unwrap();
  let mut lines = csv.lines();
  assert!(lines.next().unwrap().starts_with("uuid,name,email,organization,"));
  assert_eq!(lines.next().unwrap(), "u1,Jane,jane@acme.com,Acme,0,0,0,3,0,0");

  let (status, body) = send(&app, "GET", "/top_contributors/lfn?from=2000&to=1000", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "400");
}

#[tokio::test]
async fn unaffiliated_survives_huge_pages() {
  let rows = vec![Contribution { uuid: "stranger".into(), contributions: 1 }];
  let index = Arc::new(StubIndex { unaffiliated: rows, ..Default::default() });
  let app = app_with(index.clone()).await;

  let uri = format!("/unaffiliated/lfn?top={}&page={}", i64::MAX, i64::MAX);
  let (status, body) = send(&app, "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["rows"], MAX_TOP_LIMIT);
  assert!(body["unaffiliated"].as_array().unwrap().is_empty());
  assert_eq!(index.asks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn top_contributors_pass_search_sort_and_data_sources() {
  let index = Arc::new(StubIndex::default());
  let app = app_with(index.clone()).await;

  let uri = "/top_contributors/lfn?search=Jane&sort_field=git_commits&sort_order=asc\
             &data_source=gerrit,Git&offset=9223372036854775807";
  let (status, body) = send(&app, "GET", uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["limit"], 10);

  let (status, _, _) = send_raw(&app, "GET", "/top_contributors_csv/lfn", None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) =
    send(&app, "GET", "/top_contributors/lfn?sort_field=git_commits&sort_order=up", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let queries = index.queries.lock().unwrap().clone();
  assert_eq!(queries.len(), 2);
  assert!(queries[0].search.is_some());
  assert_eq!(queries[0].sort, Some((SortField::GitCommits, SortOrder::Asc)));
  assert_eq!(queries[0].data_sources, vec!["gerrit", "git"]);
  assert_eq!(queries[0].offset, i64::MAX);
  assert_eq!(queries[1].limit, MAX_TOP_LIMIT);
  assert_eq!(queries[1].data_sources, vec!["all"]);
}

#[tokio::test]
async fn all_lists_complete_profiles() {
  let app = app().await;
  let (_, uu) = send(&app, "POST", "/identity", Some(json!({ "uuid": null, "source": "git",
    "name": "Jane", "email": "jane@acme.com" })))
  .await;
  let (_, body) = send(&app, "GET", "/all", None).await;
  // Not enrolled anywhere yet.
  assert_eq!(body["profiles"].as_array().unwrap().len(), 0);

  let (_, org) = send(&app, "POST", "/organization", Some(json!({ "name": "Acme" }))).await;
  send(&app, "POST", "/enrollment", Some(json!({ "uuid": uu["uuid"], "organization_id": org["id"] })))
    .await;
  let (_, body) = send(&app, "GET", "/all", None).await;
  let profiles = body["profiles"].as_array().unwrap();
  assert_eq!(profiles.len(), 1);
  assert_eq!(profiles[0]["identities"][0]["email"], "jane!acme.com");
  assert_eq!(profiles[0]["enrollments"][0]["organization"], "Acme");
}

#[tokio::test]
async fn directory_lookup_comes_first_without_duplicates() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/directory/organizations?q=Acme", None).await;
  assert_eq!(status, StatusCode::OK);
  let names: Vec<_> = body["organizations"]
    .as_array()
    .unwrap()
    .iter()
    .map(|o| o["name"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(names, ["Acme", "Acme Labs"]);

  let (_, body) = send(&app, "GET", "/directory/users?q=jane", None).await;
  assert_eq!(body["users"][0]["name"], "jane");
}

#[tokio::test]
async fn identities_are_added_in_one_batch() {
  let app = app().await;
  let batch = json!([
    { "source": "git", "email": "kim@initech.com" },
    { "source": "gerrit", "username": "kim" },
  ]);
  let (status, body) = send(&app, "POST", "/identities", Some(batch)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body.as_array().unwrap().len(), 2);
  assert_eq!(body[0]["identities"][0]["email"], "kim@initech.com");

  let twin = json!([{ "source": "git", "email": "kim@initech.com" }]);
  let (status, _) = send(&app, "POST", "/identities", Some(twin)).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn bulk_update_reports_what_it_did() {
  let app = app().await;
  send(&app, "POST", "/profile/gone", Some(json!({ "name": "Gone" }))).await;
  let jane = json!({
    "uuid": "u1", "name": "Jane", "email": "jane!acme.com", "gender": null, "is_bot": false,
    "country_code": null,
    "identities": [{ "source": "git", "name": "Jane", "email": "jane!acme.com",
      "username": null }],
    "enrollments": [{ "start": "2015-01-01T00:00:00Z", "end": "2018-01-01T00:00:00Z",
      "organization": "Acme" }],
  });
  let gone = json!({ "uuid": "gone", "is_bot": false, "identities": [], "enrollments": [] });
  let (status, body) =
    send(&app, "POST", "/bulk_update", Some(json!({ "add": [jane], "del": [gone] }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["added"], 1);
  assert_eq!(body["deleted"], 1);
  assert_eq!(body["text"], "Requested: Add: 1, Delete: 1, Done: Added: 1, Deleted: 1, Updated: 0");

  let (_, rows) = send(&app, "GET", "/profile/u1/enrollments", None).await;
  assert_eq!(rows[0]["organization"]["name"], "Acme");
  let (status, _) = send(&app, "GET", "/profile/gone", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hide_emails_strips_domains() {
  let app = app().await;
  send(&app, "POST", "/profile/u1", Some(json!({ "name": "jane@acme.com" }))).await;
  let (status, body) = send(&app, "PUT", "/hide_emails", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["text"], "Hidden emails: profiles: 1, identities: 0");

  let (_, body) = send(&app, "GET", "/profile/u1", None).await;
  assert_eq!(body["profile"]["name"], "jane");
}
