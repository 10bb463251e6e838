use affil_core::remote::{DirectoryUser, UserDirectory};
use async_trait::async_trait;
use serde::Deserialize;

use crate::{
  DirectoryConfig, Result,
  client::{HttpDirectory, Listing, paging},
};

#[derive(Debug, Deserialize)]
struct UserRecord {
  #[serde(rename = "ID")]
  id:       String,
  #[serde(rename = "Name", default)]
  name:     Option<String>,
  #[serde(rename = "Email", default)]
  email:    Option<String>,
  #[serde(rename = "Username", default)]
  username: Option<String>,
}

/// User directory: `GET /users/search`.
#[derive(Clone)]
pub struct UserDirectoryClient {
  http: HttpDirectory,
}

impl UserDirectoryClient {
  pub fn new(config: DirectoryConfig) -> Result<Self> {
    Ok(Self { http: HttpDirectory::new(config)? })
  }

  pub async fn list(&self, q: &str, rows: i64, page: i64) -> Result<Vec<DirectoryUser>> {
    let mut query = vec![("q", q.to_owned())];
    query.extend(paging(rows, page));
    let listing: Option<Listing<UserRecord>> = self.http.get("/users/search", &query).await?;
    let users: Vec<_> = listing
      .map(|l| l.data)
      .unwrap_or_default()
      .into_iter()
      .map(|u| DirectoryUser { id: u.id, name: u.name, email: u.email, username: u.username })
      .collect();
    tracing::info!(q, rows, page, found = users.len(), "listed user directory");
    Ok(users)
  }
}

#[async_trait]
impl UserDirectory for UserDirectoryClient {
  async fn list_users(
    &self,
    q: &str,
    rows: i64,
    page: i64,
  ) -> affil_core::Result<Vec<DirectoryUser>> {
    Ok(self.list(q, rows, page).await?)
  }
}
