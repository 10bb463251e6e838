//! [`DocStoreClient`]: JSON search client over the document store.

use std::time::Duration;

use affil_core::{
  analytics::{
    Contribution, ContributorStats, SearchFields, TopContributorsQuery, data_source_pattern,
    index_pattern,
  },
  remote::ContributionIndex,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
  Error, Result,
  query::{
    TopContributorsResponse, UnaffiliatedResponse, keyword_fields, top_contributors_body,
    unaffiliated_body,
  },
};

/// Connection settings for the document store.
#[derive(Debug, Clone)]
pub struct DocStoreConfig {
  pub url:      String,
  pub username: Option<String>,
  pub password: Option<String>,
  pub timeout:  Duration,
}

impl DocStoreConfig {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), username: None, password: None, timeout: Duration::from_secs(60) }
  }
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct DocStoreClient {
  client: Client,
  config: DocStoreConfig,
}

impl DocStoreClient {
  pub fn new(config: DocStoreConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, index: &str, endpoint: &str) -> String {
    format!("{}/{}/{}", self.config.url.trim_end_matches('/'), index, endpoint)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match self.config.username.as_deref() {
      Some(user) if !user.is_empty() => req.basic_auth(user, self.config.password.as_deref()),
      _ => req,
    }
  }

  /// `POST <index>/_search` with `body`.
  async fn search<T: DeserializeOwned>(&self, index: &str, body: &Value) -> Result<T> {
    tracing::debug!(index, %body, "searching document store");
    let resp = self.auth(self.client.post(self.url(index, "_search"))).json(body).send().await?;
    Self::decode(resp).await
  }

  async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let text = resp.text().await.unwrap_or_default();
      return Err(Error::Status { status: status.as_u16(), reason: error_reason(&text) });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// Contributors without an organization in `index`, by document count.
  pub async fn unaffiliated_in(&self, index: &str, top_n: i64) -> Result<Vec<Contribution>> {
    let resp: UnaffiliatedResponse = self.search(index, &unaffiliated_body(top_n)).await?;
    let rows = resp.into_contributions();
    tracing::info!(index, top_n, rows = rows.len(), "fetched unaffiliated contributors");
    Ok(rows)
  }

  /// Keyword columns of every index matching `index`.
  pub async fn keyword_fields_in(&self, index: &str) -> Result<Vec<String>> {
    let resp = self.auth(self.client.get(self.url(index, "_mapping"))).send().await?;
    let mapping: Value = Self::decode(resp).await?;
    let fields = keyword_fields(&mapping);
    tracing::debug!(index, fields = fields.len(), "fetched keyword fields");
    Ok(fields)
  }

  /// One page of contributor statistics in `index`.
  pub async fn top_contributors_in(
    &self,
    index: &str,
    query: &TopContributorsQuery,
  ) -> Result<Vec<ContributorStats>> {
    let all_fields = match query.search.as_ref().map(|s| &s.fields) {
      Some(SearchFields::All) => self.keyword_fields_in(index).await?,
      _ => Vec::new(),
    };
    let body = top_contributors_body(query, &all_fields);
    let resp: TopContributorsResponse = self.search(index, &body).await?;
    let rows = resp.into_page(query);
    tracing::info!(
      index,
      limit = query.limit,
      offset = query.offset,
      rows = rows.len(),
      "fetched top contributors"
    );
    Ok(rows)
  }
}

/// `[type] reason` out of an error body, or the body itself.
fn error_reason(body: &str) -> String {
  let parsed: Option<Value> = serde_json::from_str(body).ok();
  let error = parsed.as_ref().map(|v| &v["error"]);
  match error {
    Some(e) if e.is_object() => format!(
      "{}: {}",
      e["type"].as_str().unwrap_or("error"),
      e["reason"].as_str().unwrap_or_default()
    ),
    _ => body.chars().take(200).collect(),
  }
}

#[async_trait]
impl ContributionIndex for DocStoreClient {
  async fn unaffiliated(
    &self,
    project_slug: &str,
    top_n: i64,
  ) -> affil_core::Result<Vec<Contribution>> {
    let index = index_pattern(project_slug);
    self.unaffiliated_in(&index, top_n).await.map_err(|e| {
      affil_core::Error::from(e).context(format!("unaffiliated contributors of '{project_slug}'"))
    })
  }

  async fn top_contributors(
    &self,
    project_slug: &str,
    query: &TopContributorsQuery,
  ) -> affil_core::Result<Vec<ContributorStats>> {
    let index = data_source_pattern(project_slug, &query.data_sources);
    self.top_contributors_in(&index, query).await.map_err(|e| {
      affil_core::Error::from(e).context(format!("top contributors of '{project_slug}'"))
    })
  }
}
