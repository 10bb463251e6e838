//! Shared HTTP plumbing for the directory clients.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{Error, Result};

/// Connection settings for one directory service.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
  pub url:     String,
  pub token:   Option<String>,
  pub timeout: Duration,
}

impl DirectoryConfig {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), token: None, timeout: Duration::from_secs(30) }
  }
}

/// The directories' list envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Listing<T> {
  #[serde(rename = "Data", default = "Vec::new")]
  pub data: Vec<T>,
}

#[derive(Clone)]
pub(crate) struct HttpDirectory {
  client: Client,
  config: DirectoryConfig,
}

impl HttpDirectory {
  pub(crate) fn new(config: DirectoryConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  /// `GET <url><path>?<query>`; `None` on 404.
  pub(crate) async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<Option<T>> {
    let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
    let mut req = self.client.get(&url).query(query);
    if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
      req = req.bearer_auth(token);
    }
    let resp = req.send().await?;

    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !status.is_success() {
      let body: String = resp.text().await.unwrap_or_default().chars().take(200).collect();
      return Err(Error::Status { status: status.as_u16(), body });
    }
    Ok(Some(resp.json().await?))
  }
}

/// Directories count pages from zero.
pub(crate) fn paging(rows: i64, page: i64) -> [(&'static str, String); 2] {
  [("pageSize", rows.max(1).to_string()), ("offset", (page.max(1) - 1).to_string())]
}
