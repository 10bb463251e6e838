//! The full affiliation dump handed to downstream consumers, and the bulk
//! update that feeds the same format back.
//!
//! Strings are trimmed, blank strings become absent and every `@` in an email
//! is replaced by `!`. All lists are sorted by a case-insensitive key so two
//! dumps of the same data compare equal.

use std::{collections::HashSet, hash::Hash};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffiliationIdentity {
  pub source:   String,
  pub name:     Option<String>,
  pub email:    Option<String>,
  pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffiliationEnrollment {
  pub start:        DateTime<Utc>,
  pub end:          DateTime<Utc>,
  pub organization: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationProfile {
  pub uuid:         String,
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub gender:       Option<String>,
  pub is_bot:       bool,
  pub country_code: Option<String>,
  pub identities:   Vec<AffiliationIdentity>,
  pub enrollments:  Vec<AffiliationEnrollment>,
}

pub fn clean(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

pub fn clean_email(s: Option<String>) -> Option<String> {
  clean(s).map(|s| s.replace('@', "!"))
}

/// Undo [`clean_email`] on an email coming back from a dump.
pub fn restore_email(s: Option<String>) -> Option<String> {
  clean(s).map(|s| s.replace('!', "@"))
}

/// The part before `@` when `value` reads as an email address.
pub fn email_local_part(value: &str) -> Option<&str> {
  let value = value.trim();
  let (local, domain) = value.split_once('@')?;
  let plausible = !local.is_empty()
    && !domain.contains('@')
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
    && !value.contains(char::is_whitespace);
  plausible.then_some(local)
}

fn key_part(s: &Option<String>) -> &str { s.as_deref().unwrap_or_default() }

/// Keep the first of every repeated value. Values differing only in case
/// sort next to each other, so exact repeats need not be adjacent.
fn dedup_all<T: Clone + Eq + Hash>(items: &mut Vec<T>) {
  let mut seen = HashSet::new();
  items.retain(|item| seen.insert(item.clone()));
}

impl AffiliationIdentity {
  fn normalize(self) -> Self {
    Self {
      source:   self.source.trim().to_owned(),
      name:     clean(self.name),
      email:    clean_email(self.email),
      username: clean(self.username),
    }
  }

  pub fn sort_key(&self) -> String {
    format!(
      "{}:{}:{}:{}",
      self.source,
      key_part(&self.name),
      key_part(&self.email),
      key_part(&self.username)
    )
    .to_lowercase()
  }
}

impl AffiliationEnrollment {
  pub fn sort_key(&self) -> String {
    format!("{}:{}:{}", self.start.to_rfc3339(), self.end.to_rfc3339(), self.organization)
      .to_lowercase()
  }
}

impl AffiliationProfile {
  pub fn sort_key(&self) -> String {
    format!("{}:{}:{}", key_part(&self.name), key_part(&self.email), self.uuid).to_lowercase()
  }

  fn normalize(self) -> Self {
    let mut identities: Vec<_> =
      self.identities.into_iter().map(AffiliationIdentity::normalize).collect();
    identities.sort_by_cached_key(AffiliationIdentity::sort_key);
    dedup_all(&mut identities);

    let mut enrollments: Vec<_> = self
      .enrollments
      .into_iter()
      .map(|e| AffiliationEnrollment { organization: e.organization.trim().to_owned(), ..e })
      .collect();
    enrollments.sort_by_cached_key(AffiliationEnrollment::sort_key);
    dedup_all(&mut enrollments);

    Self {
      uuid: self.uuid,
      name: clean(self.name),
      email: clean_email(self.email),
      gender: clean(self.gender),
      is_bot: self.is_bot,
      country_code: clean(self.country_code),
      identities,
      enrollments,
    }
  }
}

/// Normalise and sort a raw dump. Profiles lacking an identity or an
/// enrollment are dropped.
pub fn normalize(profiles: Vec<AffiliationProfile>) -> Vec<AffiliationProfile> {
  let mut out: Vec<_> = profiles
    .into_iter()
    .filter(|p| !p.identities.is_empty() && !p.enrollments.is_empty())
    .map(AffiliationProfile::normalize)
    .collect();
  out.sort_by_cached_key(AffiliationProfile::sort_key);
  out
}

// ─── Bulk update ─────────────────────────────────────────────────────────────

/// Profiles to create or replace and profiles to remove, in dump format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkUpdate {
  pub add: Vec<AffiliationProfile>,
  pub del: Vec<AffiliationProfile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateOutput {
  pub added:   u64,
  pub deleted: u64,
  pub updated: u64,
}

impl BulkUpdateOutput {
  /// `add` and `del` are the requested counts.
  pub fn summary(&self, add: usize, del: usize) -> String {
    format!(
      "Requested: Add: {add}, Delete: {del}, Done: Added: {}, Deleted: {}, Updated: {}",
      self.added,
      self.deleted,
      self.updated
    )
  }
}

/// Rows whose email-like names were cut down to the local part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HideEmailsOutput {
  pub profiles:   u64,
  pub identities: u64,
}
