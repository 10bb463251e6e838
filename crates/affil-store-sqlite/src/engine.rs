//! Composite operations over the repository: enrollment merge, identity and
//! enrollment moves, unique-identity merge, checkpoint rollback, domain
//! attachment and bulk maintenance. Callers run each of these inside one
//! transaction.

use std::collections::HashSet;

use affil_core::{
  affiliations::{
    AffiliationProfile, BulkUpdate, BulkUpdateOutput, HideEmailsOutput, clean, email_local_part,
    restore_email,
  },
  dates::{DateRange, encode_dt, max_period, min_period, merge_date_ranges},
  model::{
    Enrollment, Identity, NewIdentity, Profile, ProfileInput, PutOrgDomainOptions,
    PutOrgDomainOutput, validate_interval,
  },
};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::{
  Result,
  db::{DATE_FORMAT, exec, query, touch},
  repo::{
    archive::{self, Archived},
    enrollments, identities, organizations, profiles, uidentities,
  },
};

// ─── Enrollments ─────────────────────────────────────────────────────────────

/// Collapse overlapping enrollments of `uuid` in one organization.
///
/// An enrollment whose interval survives the merge unchanged is kept; every
/// other one is deleted and the merged intervals are inserted. Returns
/// whether anything changed.
pub fn merge_enrollments(conn: &Connection, uuid: &str, organization_id: i64) -> Result<bool> {
  let rows = enrollments::find_for(conn, uuid, organization_id, true)?;
  let pairs: Vec<[_; 2]> = rows.iter().map(|e| [e.start, e.end]).collect();
  let merged = merge_date_ranges(&pairs)?;

  let mut retained = HashSet::new();
  let mut missing: Vec<DateRange> = Vec::new();
  for range in merged {
    match rows.iter().find(|e| e.start == range.start && e.end == range.end) {
      Some(e) => {
        retained.insert(e.id);
      }
      None => missing.push(range),
    }
  }

  let stale: Vec<&Enrollment> = rows.iter().filter(|e| !retained.contains(&e.id)).collect();
  if stale.is_empty() && missing.is_empty() {
    return Ok(false);
  }
  for e in &stale {
    enrollments::delete_row(conn, e.id)?;
  }
  for range in &missing {
    enrollments::insert(conn, uuid, organization_id, range.start, range.end)?;
  }
  touch(conn, uuid)?;
  tracing::debug!(
    uuid,
    organization_id,
    deleted = stale.len(),
    added = missing.len(),
    "merged enrollments"
  );
  Ok(true)
}

/// Merge enrollments in every organization `uuid` is enrolled in.
pub fn merge_all_enrollments(conn: &Connection, uuid: &str) -> Result<()> {
  for organization_id in organizations::enrolled_ids(conn, uuid)? {
    merge_enrollments(conn, uuid, organization_id)?;
  }
  Ok(())
}

// ─── Moves ───────────────────────────────────────────────────────────────────

/// Re-parent `identity` under `to_uuid`, touching both ends.
pub fn move_identity_to_unique_identity(
  conn: &Connection,
  identity: &Identity,
  to_uuid: &str,
) -> Result<()> {
  if identity.uuid.as_deref() == Some(to_uuid) {
    return Ok(());
  }
  if let Some(old) = identity.uuid.as_deref() {
    touch(conn, old)?;
  }
  touch(conn, to_uuid)?;
  identities::set_uuid(conn, &identity.id, to_uuid)
}

/// Re-parent `enrollment` under `to_uuid`, touching both ends.
pub fn move_enrollment_to_unique_identity(
  conn: &Connection,
  enrollment: &Enrollment,
  to_uuid: &str,
) -> Result<()> {
  if enrollment.uuid == to_uuid {
    return Ok(());
  }
  touch(conn, &enrollment.uuid)?;
  touch(conn, to_uuid)?;
  enrollments::set_uuid(conn, enrollment.id, to_uuid)
}

/// Fold `from_uuid` into `to_uuid`: fill the target profile, move identities
/// and non-duplicate enrollments, delete the source and merge enrollments
/// per organization. With `archive`, both sub-graphs are checkpointed first
/// under one `archived_at`.
pub fn merge_unique_identities(
  conn: &Connection,
  from_uuid: &str,
  to_uuid: &str,
  archive: bool,
) -> Result<()> {
  if from_uuid == to_uuid {
    return Ok(());
  }
  uidentities::require(conn, from_uuid)?;
  uidentities::require(conn, to_uuid)?;
  let from_profile = profiles::require(conn, from_uuid)?;
  let to_profile = profiles::require(conn, to_uuid)?;

  if archive {
    let at = Utc::now();
    archive::archive_uuid(conn, from_uuid, at)?;
    archive::archive_uuid(conn, to_uuid, at)?;
  }

  let mut merged: Profile = to_profile.clone();
  merged.fill_from(&from_profile);
  if merged != to_profile {
    profiles::edit(conn, &merged, false)?;
  }

  for identity in identities::by_uuid(conn, from_uuid)? {
    move_identity_to_unique_identity(conn, &identity, to_uuid)?;
  }

  for enrollment in enrollments::by_uuid(conn, from_uuid)? {
    let duplicate = enrollments::identical_exists(
      conn,
      to_uuid,
      enrollment.organization_id,
      enrollment.start,
      enrollment.end,
    )?;
    if !duplicate {
      move_enrollment_to_unique_identity(conn, &enrollment, to_uuid)?;
    }
  }

  // Duplicate enrollments left behind cascade away with the source.
  uidentities::delete(conn, from_uuid)?;
  merge_all_enrollments(conn, to_uuid)?;
  tracing::info!(from_uuid, to_uuid, archive, "merged unique identities");
  Ok(())
}

/// Undo a checkpointed merge or move if `identity_id` and `uuid` were last
/// archived together in a two-identity checkpoint. Returns whether anything
/// was restored.
pub fn unarchive_checkpoint(conn: &Connection, identity_id: &str, uuid: &str) -> Result<bool> {
  let Some(identity_at) = archive::newest_archived_at(conn, Archived::Identity, identity_id)? else {
    return Ok(false);
  };
  let Some(uuid_at) = archive::newest_archived_at(conn, Archived::UniqueIdentity, uuid)? else {
    return Ok(false);
  };
  if identity_at != uuid_at {
    return Ok(false);
  }
  let uuids = archive::uuids_archived_at(conn, identity_at)?;
  if uuids.len() != 2 {
    return Ok(false);
  }
  for u in &uuids {
    archive::unarchive_uuid(conn, u, identity_at)?;
  }
  tracing::info!(
    identity_id,
    uuid,
    archived_at = %encode_dt(identity_at),
    "restored checkpoint"
  );
  Ok(true)
}

/// What [`move_identity`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
  /// The identity now belongs to this unique identity.
  Moved(String),
  /// A previous checkpoint was restored; the identity is back under this
  /// unique identity.
  Restored(String),
}

/// Move identity `from_id` under `to_uuid`.
///
/// With `archive`, a matching checkpoint is restored instead when one exists
/// (the call is the inverse of an earlier archived move or merge); otherwise
/// both unique identities are checkpointed before the move. When `to_uuid`
/// does not exist it is created only if it equals `from_id`.
pub fn move_identity(
  conn: &Connection,
  from_id: &str,
  to_uuid: &str,
  archive: bool,
) -> Result<MoveOutcome> {
  if archive && unarchive_checkpoint(conn, from_id, to_uuid)? {
    let identity = identities::require(conn, from_id)?;
    return Ok(MoveOutcome::Restored(identity.uuid.unwrap_or_else(|| to_uuid.to_owned())));
  }

  let identity = identities::require(conn, from_id)?;
  let target = uidentities::get(conn, to_uuid)?;
  match target {
    None if from_id != to_uuid => {
      return Err(affil_core::Error::NotFound(format!("unique identity '{to_uuid}'")).into());
    }
    None => {
      uidentities::add(conn, to_uuid)?;
      profiles::add(conn, &Profile::empty(to_uuid), false)?;
    }
    Some(_) => {
      let old = identity.uuid.as_deref().filter(|old| *old != to_uuid);
      if let (true, Some(old)) = (archive, old) {
        let at = Utc::now();
        archive::archive_uuid(conn, old, at)?;
        archive::archive_uuid(conn, to_uuid, at)?;
      }
    }
  }

  move_identity_to_unique_identity(conn, &identity, to_uuid)?;
  tracing::info!(from_id, to_uuid, archive, "moved identity");
  Ok(MoveOutcome::Moved(to_uuid.to_owned()))
}

// ─── Domains ─────────────────────────────────────────────────────────────────

/// Profiles and identities whose email ends with the domain pattern `?1`.
const MATCHING_UUIDS: &str = "SELECT uuid FROM profiles WHERE email LIKE ?1
     UNION SELECT uuid FROM identities WHERE uuid IS NOT NULL AND email LIKE ?1";

/// Bind `domain` to the organization named `org`, optionally enrolling every
/// matching profile for the whole period.
pub fn put_org_domain(
  conn: &Connection,
  org: &str,
  domain: &str,
  options: PutOrgDomainOptions,
) -> Result<PutOrgDomainOutput> {
  let organization = organizations::require_by_name(conn, org)?;
  if organizations::find_domain(conn, organization.id, domain)?.is_some() {
    return Err(
      affil_core::Error::Conflict(format!("domain '{domain}' is already bound to '{org}'")).into(),
    );
  }
  let bound = organizations::add_domain(conn, &organization, domain, options.is_top_domain)?;

  let (mut deleted, mut added) = (0, 0);
  if !options.skip_enrollments {
    let pattern = format!("%{domain}");
    let only_new = if options.overwrite {
      ""
    } else {
      "WHERE m.uuid NOT IN (SELECT uuid FROM enrollments)"
    };
    let affected: Vec<String> = query(
      conn,
      &format!("SELECT m.uuid FROM ({MATCHING_UUIDS}) m {only_new}"),
      [&pattern],
      |r| r.get(0),
    )?;
    if options.overwrite {
      deleted = exec(
        conn,
        &format!("DELETE FROM enrollments WHERE uuid IN ({MATCHING_UUIDS})"),
        [&pattern],
      )?
      .rows_affected;
    }
    added = exec(
      conn,
      &format!(
        "INSERT INTO enrollments (uuid, organization_id, start, `end`)
         SELECT m.uuid, ?2, str_to_date(?3, '{DATE_FORMAT}'), str_to_date(?4, '{DATE_FORMAT}')
         FROM ({MATCHING_UUIDS}) m {only_new}"
      ),
      params![pattern, organization.id, encode_dt(min_period()), encode_dt(max_period())],
    )?
    .rows_affected;
    for uuid in &affected {
      touch(conn, uuid)?;
    }
  }

  let info = format!(
    "domain '{domain}' bound to organization '{org}', enrollments deleted: {deleted}, added: {added}"
  );
  tracing::info!(org, domain, deleted, added, "attached domain");
  Ok(PutOrgDomainOutput { deleted: deleted as u64, added: added as u64, domain: bound, info })
}

// ─── Deletes with archive ────────────────────────────────────────────────────

/// Delete a unique identity, checkpointing its sub-graph first if asked.
pub fn delete_unique_identity(conn: &Connection, uuid: &str, archive: bool) -> Result<()> {
  uidentities::require(conn, uuid)?;
  if archive {
    archive::archive_uuid(conn, uuid, Utc::now())?;
  }
  uidentities::delete(conn, uuid)
}

/// Restore the newest checkpoint of `uuid`.
pub fn unarchive_unique_identity(conn: &Connection, uuid: &str) -> Result<()> {
  let at = archive::newest_archived_at(conn, Archived::UniqueIdentity, uuid)?
    .ok_or_else(|| affil_core::Error::NotFound(format!("archived unique identity '{uuid}'")))?;
  archive::unarchive_uuid(conn, uuid, at)
}

pub fn delete_identity(conn: &Connection, id: &str, archive: bool) -> Result<Identity> {
  if archive {
    identities::require(conn, id)?;
    archive::archive(conn, Archived::Identity, id, Utc::now())?;
  }
  identities::delete(conn, id)
}

pub fn delete_enrollment(conn: &Connection, id: i64, archive: bool) -> Result<Enrollment> {
  if archive {
    enrollments::require(conn, id)?;
    archive::archive(conn, Archived::Enrollment, id, Utc::now())?;
  }
  enrollments::delete(conn, id)
}

pub fn delete_organization(conn: &Connection, id: i64) -> Result<()> {
  organizations::require(conn, id)?;
  archive::archive(conn, Archived::Organization, id, Utc::now())?;
  organizations::delete(conn, id)
}

// ─── Identities ──────────────────────────────────────────────────────────────

/// Insert an identity; without a `uuid` its own id becomes a new unique
/// identity seeded with its name and email. Returns the owning uuid.
pub fn add_identity(conn: &Connection, identity: NewIdentity) -> Result<String> {
  identity.validate()?;
  let id = identity.id();
  let uuid = match identity.uuid.clone() {
    Some(uuid) => uuid,
    None => {
      if identities::get(conn, &id)?.is_some() {
        return Err(affil_core::Error::Conflict(format!("identity '{id}' already exists")).into());
      }
      uidentities::add(conn, &id)?;
      let profile = Profile {
        name: identity.name.clone(),
        email: identity.email.clone(),
        ..Profile::empty(id.as_str())
      };
      profiles::add(conn, &profile, false)?;
      id
    }
  };
  let identity = NewIdentity { uuid: Some(uuid.clone()), ..identity };
  identities::add(conn, &identity, false)?;
  Ok(uuid)
}

// ─── Bulk maintenance ────────────────────────────────────────────────────────

/// Create the unique identity of a dump entry from scratch. The caller has
/// removed any previous one.
fn insert_dumped(conn: &Connection, dumped: &AffiliationProfile) -> Result<()> {
  let uuid = dumped.uuid.trim();
  let input = ProfileInput {
    name: clean(dumped.name.clone()),
    email: restore_email(dumped.email.clone()),
    gender: clean(dumped.gender.clone()),
    gender_acc: None,
    is_bot: Some(i64::from(dumped.is_bot)),
    country_code: clean(dumped.country_code.clone()),
  };
  let profile = input.apply_to(&Profile::empty(uuid))?;
  uidentities::add(conn, uuid)?;
  profiles::add(conn, &profile, false)?;

  for dumped_identity in &dumped.identities {
    let new = NewIdentity {
      uuid:     Some(uuid.to_owned()),
      source:   dumped_identity.source.trim().to_owned(),
      name:     clean(dumped_identity.name.clone()),
      email:    restore_email(dumped_identity.email.clone()),
      username: clean(dumped_identity.username.clone()),
    };
    new.validate()?;
    // An identity living under another unique identity follows the dump.
    match identities::get(conn, &new.id())? {
      Some(existing) if existing.uuid.as_deref() == Some(uuid) => {}
      Some(existing) => {
        identities::set_uuid(conn, &existing.id, uuid)?;
        if let Some(old) = existing.uuid.as_deref() {
          touch(conn, old)?;
        }
        touch(conn, uuid)?;
      }
      None => {
        identities::add(conn, &new, false)?;
      }
    }
  }

  let mut seen = HashSet::new();
  for dumped_enrollment in &dumped.enrollments {
    let name = dumped_enrollment.organization.trim();
    let (start, end) = (dumped_enrollment.start, dumped_enrollment.end);
    if !seen.insert((name.to_lowercase(), start, end)) {
      continue;
    }
    validate_interval(start, end)?;
    let organization = match organizations::find_by_name(conn, name)? {
      Some(organization) => organization,
      None => organizations::add(conn, name, false)?,
    };
    enrollments::insert(conn, uuid, organization.id, start, end)?;
  }
  touch(conn, uuid)
}

/// Apply a bulk update: deletions first, then additions. An added uuid that
/// already exists is replaced and counts as updated.
pub fn bulk_update(conn: &Connection, update: &BulkUpdate) -> Result<BulkUpdateOutput> {
  let mut out = BulkUpdateOutput::default();
  for dumped in &update.del {
    let uuid = dumped.uuid.trim();
    if uidentities::get(conn, uuid)?.is_some() {
      uidentities::delete(conn, uuid)?;
      out.deleted += 1;
    }
  }
  for dumped in &update.add {
    let uuid = dumped.uuid.trim();
    if uuid.is_empty() {
      return Err(affil_core::Error::validation("uuid", "cannot be empty").into());
    }
    if uidentities::get(conn, uuid)?.is_some() {
      uidentities::delete(conn, uuid)?;
      out.updated += 1;
    } else {
      out.added += 1;
    }
    insert_dumped(conn, dumped)?;
  }
  tracing::info!(added = out.added, deleted = out.deleted, updated = out.updated, "bulk update");
  Ok(out)
}

/// Replace email-like profile names and identity names/usernames with their
/// local part, touching every unique identity that changed.
pub fn hide_emails(conn: &Connection) -> Result<HideEmailsOutput> {
  let mut out = HideEmailsOutput::default();
  let mut touched = HashSet::new();

  let named: Vec<(String, String)> = query(
    conn,
    "SELECT uuid, name FROM profiles WHERE name LIKE '%@%'",
    [],
    |r| Ok((r.get(0)?, r.get(1)?)),
  )?;
  for (uuid, name) in named {
    if let Some(local) = email_local_part(&name) {
      exec(conn, "UPDATE profiles SET name = ?2 WHERE uuid = ?1", params![uuid, local])?;
      out.profiles += 1;
      touched.insert(uuid);
    }
  }

  let rows: Vec<(String, Option<String>, Option<String>, Option<String>)> = query(
    conn,
    "SELECT id, uuid, name, username FROM identities
     WHERE name LIKE '%@%' OR username LIKE '%@%'",
    [],
    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
  )?;
  for (id, uuid, name, username) in rows {
    let hide = |value: &Option<String>| {
      value.as_deref().and_then(email_local_part).map(str::to_owned)
    };
    let (new_name, new_username) = (hide(&name), hide(&username));
    if new_name.is_none() && new_username.is_none() {
      continue;
    }
    exec(
      conn,
      "UPDATE identities
       SET name = ?2, username = ?3, last_modified = now()
       WHERE id = ?1",
      params![id, new_name.or(name), new_username.or(username)],
    )?;
    out.identities += 1;
    touched.extend(uuid);
  }

  for uuid in &touched {
    touch(conn, uuid)?;
  }
  tracing::info!(profiles = out.profiles, identities = out.identities, "hid emails");
  Ok(out)
}
