//! Outbound collaborators: the contribution index and the directories.
//!
//! These are object-safe so the HTTP layer can hold them as `Arc<dyn _>` and
//! tests can substitute in-process stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  analytics::{Contribution, ContributorStats, TopContributorsQuery},
};

/// Search backend holding per-project contribution documents.
#[async_trait]
pub trait ContributionIndex: Send + Sync {
  /// Contributors whose documents carry no organization, by document count.
  /// `top_n <= 0` asks for every bucket.
  async fn unaffiliated(&self, project_slug: &str, top_n: i64) -> Result<Vec<Contribution>>;

  /// One page of contributors ranked by activity inside the query window.
  /// Only the statistics columns are filled.
  async fn top_contributors(
    &self,
    project_slug: &str,
    query: &TopContributorsQuery,
  ) -> Result<Vec<ContributorStats>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryOrganization {
  pub id:   String,
  pub name: String,
  #[serde(default)]
  pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
  pub id:       String,
  pub name:     Option<String>,
  pub email:    Option<String>,
  pub username: Option<String>,
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
  /// Exact lookup by name. `None` when the directory has no such entry.
  async fn lookup_organization(&self, name: &str) -> Result<Option<DirectoryOrganization>>;

  /// Free-text search; `page` is 1-based.
  async fn search_organizations(
    &self,
    q: &str,
    rows: i64,
    page: i64,
  ) -> Result<Vec<DirectoryOrganization>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
  /// Free-text user search; `page` is 1-based.
  async fn list_users(&self, q: &str, rows: i64, page: i64) -> Result<Vec<DirectoryUser>>;
}
