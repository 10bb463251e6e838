//! Read-side reports: unaffiliated filtering, contributor enrichment and the
//! full affiliation dump.

use std::collections::HashMap;

use affil_core::{
  affiliations::{self, AffiliationEnrollment, AffiliationIdentity, AffiliationProfile},
  analytics::{Contribution, ContributorStats, UnaffiliatedContributor},
  dates::encode_dt,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params_from_iter, types::Value};

use crate::{
  Result,
  db::{DATE_FORMAT, placeholders, query},
  encode::decode_dt,
};

/// Keep `IN (...)` lists well under SQLite's bound-parameter limit.
const CHUNK: usize = 500;

/// Contributors present in `profiles`, not bots, with no enrollment at all;
/// most contributions first.
pub fn check_unaffiliated(
  conn: &Connection,
  rows: &[Contribution],
) -> Result<Vec<UnaffiliatedContributor>> {
  let contributions: HashMap<&str, i64> =
    rows.iter().map(|r| (r.uuid.as_str(), r.contributions)).collect();

  let mut out = Vec::new();
  for chunk in rows.chunks(CHUNK) {
    let keys: Vec<Value> = chunk.iter().map(|r| Value::Text(r.uuid.clone())).collect();
    let found: Vec<(String, Option<String>)> = query(
      conn,
      &format!(
        "SELECT p.uuid, p.name FROM profiles p
         WHERE p.uuid IN ({})
           AND coalesce(p.is_bot, 0) != 1
           AND NOT EXISTS (SELECT 1 FROM enrollments e WHERE e.uuid = p.uuid)",
        placeholders(1, keys.len())
      ),
      params_from_iter(keys.iter()),
      |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    for (uuid, name) in found {
      let contributions = contributions.get(uuid.as_str()).copied().unwrap_or_default();
      out.push(UnaffiliatedContributor { uuid, name, contributions });
    }
  }
  out.sort_by(|a, b| b.contributions.cmp(&a.contributions).then_with(|| a.uuid.cmp(&b.uuid)));
  Ok(out)
}

/// Fill name, email and the organization enrolled at `at` for each row.
/// Rows whose uuid has no profile are returned unchanged.
pub fn enrich_contributors(
  conn: &Connection,
  mut rows: Vec<ContributorStats>,
  at: DateTime<Utc>,
) -> Result<Vec<ContributorStats>> {
  let stamp = encode_dt(at);
  let mut found: HashMap<String, (Option<String>, Option<String>, Option<String>)> = HashMap::new();

  for chunk in rows.chunks(CHUNK) {
    let mut values = vec![Value::Text(stamp.clone())];
    values.extend(chunk.iter().map(|r| Value::Text(r.uuid.clone())));
    let hits: Vec<(String, Option<String>, Option<String>, Option<String>)> = query(
      conn,
      &format!(
        "SELECT p.uuid, p.name, p.email, o.name
         FROM profiles p
         LEFT JOIN enrollments e
           ON e.uuid = p.uuid
          AND e.start <= str_to_date(?1, '{DATE_FORMAT}')
          AND e.`end` >= str_to_date(?1, '{DATE_FORMAT}')
         LEFT JOIN organizations o ON o.id = e.organization_id
         WHERE p.uuid IN ({})
         ORDER BY p.uuid, e.start DESC, o.name",
        placeholders(2, chunk.len())
      ),
      params_from_iter(values.iter()),
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    for (uuid, name, email, org) in hits {
      found.entry(uuid).or_insert((name, email, org));
    }
  }

  for row in &mut rows {
    if let Some((name, email, org)) = found.get(&row.uuid) {
      row.name = name.clone();
      row.email = email.clone();
      row.organization = org.clone();
    }
  }
  Ok(rows)
}

/// Every profile with at least one identity and one enrollment, normalised
/// and sorted.
pub fn all_affiliations(conn: &Connection) -> Result<Vec<AffiliationProfile>> {
  let profiles: Vec<AffiliationProfile> = query(
    conn,
    "SELECT p.uuid, p.name, p.email, p.gender, p.is_bot, p.country_code
     FROM profiles p
     WHERE EXISTS (SELECT 1 FROM identities i WHERE i.uuid = p.uuid)
       AND EXISTS (SELECT 1 FROM enrollments e WHERE e.uuid = p.uuid)",
    [],
    |row| {
      Ok(AffiliationProfile {
        uuid:         row.get(0)?,
        name:         row.get(1)?,
        email:        row.get(2)?,
        gender:       row.get(3)?,
        is_bot:       row.get(4)?,
        country_code: row.get(5)?,
        identities:   Vec::new(),
        enrollments:  Vec::new(),
      })
    },
  )?;
  let mut by_uuid: HashMap<String, AffiliationProfile> =
    profiles.into_iter().map(|p| (p.uuid.clone(), p)).collect();

  let identities: Vec<(String, AffiliationIdentity)> = query(
    conn,
    "SELECT DISTINCT uuid, source, name, email, username FROM identities WHERE uuid IS NOT NULL",
    [],
    |row| {
      Ok((row.get(0)?, AffiliationIdentity {
        source:   row.get(1)?,
        name:     row.get(2)?,
        email:    row.get(3)?,
        username: row.get(4)?,
      }))
    },
  )?;
  for (uuid, identity) in identities {
    if let Some(p) = by_uuid.get_mut(&uuid) {
      p.identities.push(identity);
    }
  }

  let enrollments: Vec<(String, String, String, String)> = query(
    conn,
    "SELECT DISTINCT e.uuid, e.start, e.`end`, o.name
     FROM enrollments e JOIN organizations o ON o.id = e.organization_id",
    [],
    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
  )?;
  for (uuid, start, end, organization) in enrollments {
    if let Some(p) = by_uuid.get_mut(&uuid) {
      p.enrollments.push(AffiliationEnrollment {
        start: decode_dt(&start)?,
        end: decode_dt(&end)?,
        organization,
      });
    }
  }

  Ok(affiliations::normalize(by_uuid.into_values().collect()))
}
