use affil_core::remote::{DirectoryOrganization, OrganizationDirectory};
use async_trait::async_trait;
use serde::Deserialize;

use crate::{
  DirectoryConfig, Result,
  client::{HttpDirectory, Listing, paging},
};

#[derive(Debug, Deserialize)]
struct OrgRecord {
  #[serde(rename = "ID", default)]
  id:   String,
  #[serde(rename = "Name", default)]
  name: String,
  #[serde(rename = "Link", default)]
  link: Option<String>,
}

impl OrgRecord {
  /// Lookups answer with an empty record when nothing matches.
  fn into_organization(self) -> Option<DirectoryOrganization> {
    if self.id.is_empty() || self.name.is_empty() {
      return None;
    }
    Some(DirectoryOrganization {
      id:   self.id,
      name: self.name,
      link: self.link.filter(|l| !l.is_empty()),
    })
  }
}

/// Organization directory: `GET /orgs/lookup?name=` and `GET /orgs/search`.
#[derive(Clone)]
pub struct OrganizationDirectoryClient {
  http: HttpDirectory,
}

impl OrganizationDirectoryClient {
  pub fn new(config: DirectoryConfig) -> Result<Self> {
    Ok(Self { http: HttpDirectory::new(config)? })
  }

  pub async fn lookup(&self, name: &str) -> Result<Option<DirectoryOrganization>> {
    let record: Option<OrgRecord> =
      self.http.get("/orgs/lookup", &[("name", name.to_owned())]).await?;
    Ok(record.and_then(OrgRecord::into_organization))
  }

  pub async fn search(&self, q: &str, rows: i64, page: i64) -> Result<Vec<DirectoryOrganization>> {
    let mut query = vec![("name", q.to_owned())];
    query.extend(paging(rows, page));
    let listing: Option<Listing<OrgRecord>> = self.http.get("/orgs/search", &query).await?;
    let orgs: Vec<_> = listing
      .map(|l| l.data)
      .unwrap_or_default()
      .into_iter()
      .filter_map(OrgRecord::into_organization)
      .collect();
    tracing::info!(q, rows, page, found = orgs.len(), "searched organization directory");
    Ok(orgs)
  }
}

#[async_trait]
impl OrganizationDirectory for OrganizationDirectoryClient {
  async fn lookup_organization(
    &self,
    name: &str,
  ) -> affil_core::Result<Option<DirectoryOrganization>> {
    Ok(self.lookup(name).await?)
  }

  async fn search_organizations(
    &self,
    q: &str,
    rows: i64,
    page: i64,
  ) -> affil_core::Result<Vec<DirectoryOrganization>> {
    Ok(self.search(q, rows, page).await?)
  }
}
