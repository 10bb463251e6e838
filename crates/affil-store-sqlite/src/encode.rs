//! Row decoding between SQLite columns and the domain types.
//!
//! Rows are first read into `Raw*` structs of plain column values inside the
//! rusqlite row callback, then converted with `into_*`, which can fail with a
//! [`Error::Decode`].

use affil_core::{
  dates::parse_dt,
  model::{
    Domain, Enrollment, EnrollmentNested, Identity, Organization, Profile, UniqueIdentity,
  },
};
use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::{Error, Result};

pub const UIDENTITY_COLUMNS: &str = "uuid, last_modified";
pub const PROFILE_COLUMNS: &str = "uuid, name, email, gender, gender_acc, is_bot, country_code";
pub const IDENTITY_COLUMNS: &str = "id, uuid, source, name, email, username, last_modified";
pub const ENROLLMENT_COLUMNS: &str = "id, uuid, organization_id, start, `end`";
pub const ORGANIZATION_COLUMNS: &str = "id, name";

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  parse_dt(s).ok_or_else(|| Error::Decode(format!("invalid timestamp {s:?}")))
}

// ─── Unique identity ─────────────────────────────────────────────────────────

pub struct RawUniqueIdentity {
  pub uuid:          String,
  pub last_modified: String,
}

impl RawUniqueIdentity {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { uuid: row.get(0)?, last_modified: row.get(1)? })
  }

  pub fn into_unique_identity(self) -> Result<UniqueIdentity> {
    Ok(UniqueIdentity { last_modified: decode_dt(&self.last_modified)?, uuid: self.uuid })
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

pub struct RawProfile {
  pub uuid:         String,
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub gender:       Option<String>,
  pub gender_acc:   Option<i64>,
  pub is_bot:       i64,
  pub country_code: Option<String>,
}

impl RawProfile {
  /// Read [`PROFILE_COLUMNS`] starting at column `at`.
  pub fn from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      uuid:         row.get(at)?,
      name:         row.get(at + 1)?,
      email:        row.get(at + 2)?,
      gender:       row.get(at + 3)?,
      gender_acc:   row.get(at + 4)?,
      is_bot:       row.get(at + 5)?,
      country_code: row.get(at + 6)?,
    })
  }

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> { Self::from_row_at(row, 0) }

  pub fn into_profile(self) -> Result<Profile> {
    let gender = self
      .gender
      .map(|g| g.parse())
      .transpose()
      .map_err(|e: affil_core::Error| Error::Decode(e.to_string()))?;
    Ok(Profile {
      uuid: self.uuid,
      name: self.name,
      email: self.email,
      gender,
      gender_acc: self.gender_acc,
      is_bot: self.is_bot != 0,
      country_code: self.country_code,
    })
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

pub struct RawIdentity {
  pub id:            String,
  pub uuid:          Option<String>,
  pub source:        String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub username:      Option<String>,
  pub last_modified: String,
}

impl RawIdentity {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      uuid:          row.get(1)?,
      source:        row.get(2)?,
      name:          row.get(3)?,
      email:         row.get(4)?,
      username:      row.get(5)?,
      last_modified: row.get(6)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      last_modified: decode_dt(&self.last_modified)?,
      id:            self.id,
      uuid:          self.uuid,
      source:        self.source,
      name:          self.name,
      email:         self.email,
      username:      self.username,
    })
  }
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

pub struct RawEnrollment {
  pub id:              i64,
  pub uuid:            String,
  pub organization_id: i64,
  pub start:           String,
  pub end:             String,
}

impl RawEnrollment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      uuid:            row.get(1)?,
      organization_id: row.get(2)?,
      start:           row.get(3)?,
      end:             row.get(4)?,
    })
  }

  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      id:              self.id,
      uuid:            self.uuid,
      organization_id: self.organization_id,
      start:           decode_dt(&self.start)?,
      end:             decode_dt(&self.end)?,
    })
  }
}

/// [`ENROLLMENT_COLUMNS`] followed by the organization name.
pub struct RawEnrollmentNested {
  pub enrollment:        RawEnrollment,
  pub organization_name: String,
}

impl RawEnrollmentNested {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { enrollment: RawEnrollment::from_row(row)?, organization_name: row.get(5)? })
  }

  pub fn into_enrollment_nested(self) -> Result<EnrollmentNested> {
    let e = self.enrollment.into_enrollment()?;
    Ok(EnrollmentNested {
      organization:    Organization { id: e.organization_id, name: self.organization_name },
      id:              e.id,
      uuid:            e.uuid,
      organization_id: e.organization_id,
      start:           e.start,
      end:             e.end,
    })
  }
}

// ─── Organization / domain ───────────────────────────────────────────────────

pub fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
  Ok(Organization { id: row.get(0)?, name: row.get(1)? })
}

/// Columns: `d.id, d.organization_id, o.name, d.domain, d.is_top_domain`.
pub const DOMAIN_COLUMNS: &str = "d.id, d.organization_id, o.name, d.domain, d.is_top_domain";

pub fn domain_from_row(row: &Row<'_>) -> rusqlite::Result<Domain> {
  Ok(Domain {
    id:                row.get(0)?,
    organization_id:   row.get(1)?,
    organization_name: row.get(2)?,
    domain:            row.get(3)?,
    is_top_domain:     row.get(4)?,
  })
}

/// Convert a batch of raw rows, failing on the first undecodable one.
pub fn decode_all<R, T>(rows: Vec<R>, f: impl Fn(R) -> Result<T>) -> Result<Vec<T>> {
  rows.into_iter().map(f).collect()
}
