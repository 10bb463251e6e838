//! Outbound collaborators built from the configuration.
//!
//! A collaborator without a configured URL is replaced by [`Unconfigured`],
//! which fails every call, so the rest of the API still serves.

use std::sync::Arc;

use affil_core::{
  Error, Result,
  analytics::{Contribution, ContributorStats, TopContributorsQuery},
  remote::{
    ContributionIndex, DirectoryOrganization, DirectoryUser, OrganizationDirectory,
    UserDirectory,
  },
};
use affil_directory::{DirectoryConfig, OrganizationDirectoryClient, UserDirectoryClient};
use affil_docstore::{DocStoreClient, DocStoreConfig};
use anyhow::Context as _;
use async_trait::async_trait;

use crate::config::ServerConfig;

pub struct Unconfigured(pub &'static str);

impl Unconfigured {
  fn error(&self) -> Error { Error::Internal(format!("{} is not configured", self.0)) }
}

#[async_trait]
impl ContributionIndex for Unconfigured {
  async fn unaffiliated(&self, _project_slug: &str, _top_n: i64) -> Result<Vec<Contribution>> {
    Err(self.error())
  }

  async fn top_contributors(
    &self,
    _project_slug: &str,
    _query: &TopContributorsQuery,
  ) -> Result<Vec<ContributorStats>> {
    Err(self.error())
  }
}

#[async_trait]
impl OrganizationDirectory for Unconfigured {
  async fn lookup_organization(&self, _name: &str) -> Result<Option<DirectoryOrganization>> {
    Err(self.error())
  }

  async fn search_organizations(
    &self,
    _q: &str,
    _rows: i64,
    _page: i64,
  ) -> Result<Vec<DirectoryOrganization>> {
    Err(self.error())
  }
}

#[async_trait]
impl UserDirectory for Unconfigured {
  async fn list_users(&self, _q: &str, _rows: i64, _page: i64) -> Result<Vec<DirectoryUser>> {
    Err(self.error())
  }
}

fn configured(url: &Option<String>) -> Option<&str> {
  url.as_deref().map(str::trim).filter(|u| !u.is_empty())
}

pub fn contribution_index(cfg: &ServerConfig) -> anyhow::Result<Arc<dyn ContributionIndex>> {
  let Some(url) = configured(&cfg.elastic_url) else {
    tracing::warn!("ELASTIC_URL is not set; analytics endpoints will fail");
    return Ok(Arc::new(Unconfigured("document store")));
  };
  let client = DocStoreClient::new(DocStoreConfig {
    username: cfg.elastic_username.clone(),
    password: cfg.elastic_password.clone(),
    ..DocStoreConfig::new(url)
  })
  .context("failed to build document store client")?;
  Ok(Arc::new(client))
}

fn directory_config(cfg: &ServerConfig, url: &str) -> DirectoryConfig {
  DirectoryConfig { token: cfg.directory_token.clone(), ..DirectoryConfig::new(url) }
}

pub fn organization_directory(
  cfg: &ServerConfig,
) -> anyhow::Result<Arc<dyn OrganizationDirectory>> {
  let Some(url) = configured(&cfg.org_service_url) else {
    tracing::warn!("ORG_SERVICE_URL is not set; organization directory calls will fail");
    return Ok(Arc::new(Unconfigured("organization directory")));
  };
  let client = OrganizationDirectoryClient::new(directory_config(cfg, url))
    .context("failed to build organization directory client")?;
  Ok(Arc::new(client))
}

pub fn user_directory(cfg: &ServerConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
  let Some(url) = configured(&cfg.user_service_url) else {
    tracing::warn!("USER_SERVICE_URL is not set; user directory calls will fail");
    return Ok(Arc::new(Unconfigured("user directory")));
  };
  let client = UserDirectoryClient::new(directory_config(cfg, url))
    .context("failed to build user directory client")?;
  Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
  use affil_core::{Coded, ErrorKind};

  use super::*;

  #[tokio::test]
  async fn missing_urls_yield_failing_collaborators() {
    let cfg = ServerConfig { elastic_url: Some("  ".into()), ..Default::default() };
    let index = contribution_index(&cfg).unwrap();
    let err = index.unaffiliated("lfn", 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.to_string(), "document store is not configured");
  }

  #[tokio::test]
  async fn configured_urls_build_clients() {
    let cfg = ServerConfig {
      org_service_url: Some("http://orgs.invalid".into()),
      user_service_url: Some("http://users.invalid".into()),
      ..Default::default()
    };
    assert!(organization_directory(&cfg).is_ok());
    assert!(user_directory(&cfg).is_ok());
  }
}
