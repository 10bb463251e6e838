//! The identity graph: unique identities, profiles, identities, organizations,
//! domains, enrollments and the flat reference tables.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  dates::{in_period, max_period, min_period},
  identity::identity_id,
};

// ─── Unique identity ─────────────────────────────────────────────────────────

/// One real person; the root of the identity graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIdentity {
  pub uuid:          String,
  pub last_modified: DateTime<Utc>,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
}

impl Gender {
  pub fn as_str(self) -> &'static str {
    match self {
      Gender::Male => "male",
      Gender::Female => "female",
    }
  }
}

impl fmt::Display for Gender {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Gender {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "male" => Ok(Gender::Male),
      "female" => Ok(Gender::Female),
      other => Err(Error::validation(
        "gender",
        format!("'{other}' must be one of 'male' or 'female'"),
      )),
    }
  }
}

/// The displayed facts about a person, one-to-one with [`UniqueIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub uuid:         String,
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub gender:       Option<Gender>,
  pub gender_acc:   Option<i64>,
  pub is_bot:       bool,
  pub country_code: Option<String>,
}

impl Profile {
  /// An empty profile for a freshly created unique identity.
  pub fn empty(uuid: impl Into<String>) -> Self {
    Self {
      uuid:         uuid.into(),
      name:         None,
      email:        None,
      gender:       None,
      gender_acc:   None,
      is_bot:       false,
      country_code: None,
    }
  }

  /// Check the row-level rules. Country existence is checked by the store.
  pub fn validate(&self) -> Result<()> {
    if self.uuid.trim().is_empty() {
      return Err(Error::validation("uuid", "cannot be empty"));
    }
    match (self.gender, self.gender_acc) {
      (None, Some(_)) => Err(Error::validation(
        "gender_acc",
        "can only be set when gender is given",
      )),
      (Some(_), Some(acc)) if !(1..=100).contains(&acc) => Err(Error::validation(
        "gender_acc",
        format!("{acc} is not within [1, 100]"),
      )),
      _ => Ok(()),
    }
  }

  /// Fill every empty field of `self` from `other`. A bot stays a bot.
  ///
  /// `gender_acc` travels together with `gender`.
  pub fn fill_from(&mut self, other: &Profile) {
    if is_blank(&self.name) {
      self.name = other.name.clone();
    }
    if is_blank(&self.email) {
      self.email = other.email.clone();
    }
    if is_blank(&self.country_code) {
      self.country_code = other.country_code.clone();
    }
    if self.gender.is_none() && other.gender.is_some() {
      self.gender = other.gender;
      self.gender_acc = other.gender_acc;
    }
    if other.is_bot {
      self.is_bot = true;
    }
  }
}

/// Raw profile fields as received from a caller. Only present, non-empty
/// fields overwrite an existing profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub gender:       Option<String>,
  pub gender_acc:   Option<i64>,
  pub is_bot:       Option<i64>,
  pub country_code: Option<String>,
}

impl ProfileInput {
  /// Overlay this input onto `profile`, returning the validated result.
  pub fn apply_to(&self, profile: &Profile) -> Result<Profile> {
    let mut out = profile.clone();
    if let Some(name) = non_empty(&self.name) {
      out.name = Some(name.to_owned());
    }
    if let Some(email) = non_empty(&self.email) {
      out.email = Some(email.to_owned());
    }
    if let Some(code) = non_empty(&self.country_code) {
      out.country_code = Some(code.to_owned());
    }
    if let Some(gender) = non_empty(&self.gender) {
      out.gender = Some(gender.parse()?);
    }
    if let Some(acc) = self.gender_acc {
      out.gender_acc = Some(acc);
    }
    match self.is_bot {
      None => {}
      Some(0) => out.is_bot = false,
      Some(1) => out.is_bot = true,
      Some(other) => {
        return Err(Error::validation("is_bot", format!("{other} must be 0 or 1")));
      }
    }
    out.validate()?;
    Ok(out)
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// One persona on one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id:            String,
  pub uuid:          Option<String>,
  pub source:        String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub username:      Option<String>,
  pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
  #[serde(default)]
  pub uuid:     Option<String>,
  pub source:   String,
  #[serde(default)]
  pub name:     Option<String>,
  #[serde(default)]
  pub email:    Option<String>,
  #[serde(default)]
  pub username: Option<String>,
}

impl NewIdentity {
  pub fn validate(&self) -> Result<()> {
    if self.source.trim().is_empty() {
      return Err(Error::validation("source", "cannot be empty"));
    }
    if [&self.name, &self.email, &self.username].iter().all(|f| is_blank(f)) {
      return Err(Error::validation(
        "name",
        "at least one of name, email or username must be given",
      ));
    }
    Ok(())
  }

  /// The derived primary key of this identity.
  pub fn id(&self) -> String {
    identity_id(
      &self.source,
      self.email.as_deref(),
      self.name.as_deref(),
      self.username.as_deref(),
    )
  }
}

/// Replacement values for an existing identity. The `id` does not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUpdate {
  pub source:   String,
  #[serde(default)]
  pub name:     Option<String>,
  #[serde(default)]
  pub email:    Option<String>,
  #[serde(default)]
  pub username: Option<String>,
}

impl IdentityUpdate {
  pub fn validate(&self, id: &str) -> Result<()> {
    if id.trim().is_empty() {
      return Err(Error::validation("id", "cannot be empty"));
    }
    if self.source.trim().is_empty() {
      return Err(Error::validation("source", "cannot be empty"));
    }
    Ok(())
  }
}

// ─── Organizations and domains ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Organization {
  pub id:   i64,
  pub name: String,
}

pub fn validate_organization_name(name: &str) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::validation("name", "organization name cannot be empty"));
  }
  Ok(())
}

pub fn validate_id(field: &'static str, id: i64) -> Result<()> {
  if id <= 0 {
    return Err(Error::validation(field, format!("{id} must be positive")));
  }
  Ok(())
}

/// A mail domain bound to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
  pub id:                i64,
  pub organization_id:   i64,
  pub organization_name: String,
  pub domain:            String,
  pub is_top_domain:     bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationNested {
  pub id:      i64,
  pub name:    String,
  pub domains: Vec<Domain>,
}

/// Switches of [`crate::store::AffiliationStore::put_org_domain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PutOrgDomainOptions {
  /// Delete existing enrollments of matching profiles before enrolling them.
  pub overwrite:        bool,
  pub is_top_domain:    bool,
  pub skip_enrollments: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOrgDomainOutput {
  pub deleted: u64,
  pub added:   u64,
  pub domain:  Domain,
  pub info:    String,
}

// ─── Enrollments ─────────────────────────────────────────────────────────────

/// "Person worked at organization between start and end", a closed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub id:              i64,
  pub uuid:            String,
  pub organization_id: i64,
  pub start:           DateTime<Utc>,
  pub end:             DateTime<Utc>,
}

/// An enrollment together with the organization it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentNested {
  pub id:              i64,
  pub uuid:            String,
  pub organization_id: i64,
  pub start:           DateTime<Utc>,
  pub end:             DateTime<Utc>,
  pub organization:    Organization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
  pub uuid:            String,
  pub organization_id: i64,
  /// Defaults to [`min_period`].
  #[serde(default)]
  pub start:           Option<DateTime<Utc>>,
  /// Defaults to [`max_period`].
  #[serde(default)]
  pub end:             Option<DateTime<Utc>>,
}

impl NewEnrollment {
  pub fn interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
    (
      self.start.unwrap_or_else(min_period),
      self.end.unwrap_or_else(max_period),
    )
  }

  pub fn validate(&self) -> Result<()> {
    if self.uuid.trim().is_empty() {
      return Err(Error::validation("uuid", "cannot be empty"));
    }
    validate_id("organization_id", self.organization_id)?;
    let (start, end) = self.interval();
    validate_interval(start, end)
  }
}

/// New values for an enrollment; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentUpdate {
  pub organization_id: Option<i64>,
  pub start:           Option<DateTime<Utc>>,
  pub end:             Option<DateTime<Utc>>,
}

impl EnrollmentUpdate {
  pub fn apply_to(&self, enrollment: &Enrollment) -> Result<Enrollment> {
    validate_id("id", enrollment.id)?;
    let mut out = enrollment.clone();
    if let Some(org) = self.organization_id {
      validate_id("organization_id", org)?;
      out.organization_id = org;
    }
    if let Some(start) = self.start {
      out.start = start;
    }
    if let Some(end) = self.end {
      out.end = end;
    }
    validate_interval(out.start, out.end)?;
    Ok(out)
  }
}

pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
  if !in_period(start) {
    return Err(Error::validation("start", format!("{} is out of range", start.to_rfc3339())));
  }
  if !in_period(end) {
    return Err(Error::validation("end", format!("{} is out of range", end.to_rfc3339())));
  }
  if start > end {
    return Err(Error::validation(
      "start",
      format!("{} is after end {}", start.to_rfc3339(), end.to_rfc3339()),
    ));
  }
  Ok(())
}

// ─── Nested views ────────────────────────────────────────────────────────────

/// A unique identity with everything hanging off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIdentityNested {
  pub uuid:          String,
  pub last_modified: DateTime<Utc>,
  pub profile:       Option<Profile>,
  pub identities:    Vec<Identity>,
  pub enrollments:   Vec<EnrollmentNested>,
}

// ─── Reference tables ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingBlacklist {
  pub excluded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  pub code:   String,
  pub name:   String,
  pub alpha3: String,
}

// ─── Paging ──────────────────────────────────────────────────────────────────

pub const DEFAULT_ROWS: i64 = 10;
pub const UNLIMITED_ROWS: i64 = 65_535;

/// A normalised page request: `rows > 0`, `page >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub q:    Option<String>,
  pub rows: i64,
  pub page: i64,
}

impl PageRequest {
  pub fn new(q: Option<String>, rows: Option<i64>, page: Option<i64>) -> Self {
    let rows = match rows {
      None => DEFAULT_ROWS,
      Some(r) if r <= 0 => UNLIMITED_ROWS,
      Some(r) => r,
    };
    let q = q.map(|q| q.trim().to_owned()).filter(|q| !q.is_empty());
    Self { q, rows, page: page.unwrap_or(1).max(1) }
  }

  /// Rows to skip; saturates instead of wrapping on huge pages.
  pub fn offset(&self) -> i64 { (self.page - 1).saturating_mul(self.rows) }
}

impl Default for PageRequest {
  fn default() -> Self { Self::new(None, None, None) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:     Vec<T>,
  pub n_records: i64,
  pub page:      i64,
  pub rows:      i64,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, n_records: i64, req: &PageRequest) -> Self {
    Self { items, n_records, page: req.page, rows: req.rows }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn non_empty(s: &Option<String>) -> Option<&str> {
  s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn is_blank(s: &Option<String>) -> bool { non_empty(s).is_none() }
