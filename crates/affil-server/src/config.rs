//! Server configuration: an optional TOML file overlaid by the process
//! environment.
//!
//! Environment variables are read without a prefix and lower-cased, so
//! `SH_DSN` fills `sh_dsn` and `ELASTIC_URL` fills `elastic_url`.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Path or SQLite URI of the affiliation store. Wins over `sh_db`.
  pub sh_dsn:               Option<String>,
  pub sh_db:                String,
  pub sh_params:            Option<String>,
  pub host:                 String,
  pub port:                 u16,
  pub max_inflight:         usize,
  pub request_timeout_secs: u64,
  pub log_level:            String,
  pub elastic_url:          Option<String>,
  pub elastic_username:     Option<String>,
  pub elastic_password:     Option<String>,
  pub org_service_url:      Option<String>,
  pub user_service_url:     Option<String>,
  pub directory_token:      Option<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      sh_dsn:               None,
      sh_db:                "affiliation.db".to_string(),
      sh_params:            None,
      host:                 "0.0.0.0".to_string(),
      port:                 8080,
      max_inflight:         50,
      request_timeout_secs: 60,
      log_level:            "debug".to_string(),
      elastic_url:          None,
      elastic_username:     None,
      elastic_password:     None,
      org_service_url:      None,
      user_service_url:     None,
      directory_token:      None,
    }
  }
}

impl ServerConfig {
  /// Where to open the store: `sh_dsn`, else `file:<sh_db>?<sh_params>`.
  pub fn store_path(&self) -> PathBuf {
    if let Some(dsn) = self.sh_dsn.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
      return expand_tilde(dsn);
    }
    match self.sh_params.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
      Some(params) => PathBuf::from(format!("file:{}?{params}", self.sh_db)),
      None => expand_tilde(&self.sh_db),
    }
  }

  /// The default log directive; `RUST_LOG` still overrides it.
  pub fn log_filter(&self) -> anyhow::Result<LevelFilter> {
    self
      .log_level
      .trim()
      .parse()
      .map_err(|_| anyhow::anyhow!("invalid LOG_LEVEL '{}'", self.log_level))
  }

  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs.max(1)) }

  /// Values that must never show up in responses or logs.
  pub fn secrets(&self) -> impl Iterator<Item = &str> {
    [&self.elastic_password, &self.directory_token]
      .into_iter()
      .filter_map(|s| s.as_deref())
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
  if let Some(rest) = path.strip_prefix("~/") {
    if let Ok(home) = std::env::var("HOME") {
      return PathBuf::from(home).join(rest);
    }
  }
  PathBuf::from(path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dsn_wins_over_db_name() {
    let cfg = ServerConfig {
      sh_dsn: Some("/var/lib/affil.db".into()),
      sh_params: Some("mode=rwc".into()),
      ..Default::default()
    };
    assert_eq!(cfg.store_path(), PathBuf::from("/var/lib/affil.db"));
  }

  #[test]
  fn params_build_a_uri() {
    let cfg = ServerConfig { sh_params: Some("mode=rwc".into()), ..Default::default() };
    assert_eq!(cfg.store_path(), PathBuf::from("file:affiliation.db?mode=rwc"));
    assert_eq!(ServerConfig::default().store_path(), PathBuf::from("affiliation.db"));
  }

  #[test]
  fn log_levels() {
    let mut cfg = ServerConfig::default();
    assert_eq!(cfg.log_filter().unwrap(), LevelFilter::DEBUG);
    cfg.log_level = "warn".into();
    assert_eq!(cfg.log_filter().unwrap(), LevelFilter::WARN);
    cfg.log_level = "chatty".into();
    assert!(cfg.log_filter().is_err());
  }

  #[test]
  fn only_present_secrets_are_listed() {
    let cfg = ServerConfig { directory_token: Some("t0k".into()), ..Default::default() };
    assert_eq!(cfg.secrets().collect::<Vec<_>>(), ["t0k"]);
  }
}
