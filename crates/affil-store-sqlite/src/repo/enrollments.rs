//! Enrollments: closed intervals of membership in an organization.

use affil_core::{
  dates::encode_dt,
  model::{Enrollment, EnrollmentNested, NewEnrollment},
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::{
  Result,
  db::{exec, query, query_opt, touch},
  encode::{ENROLLMENT_COLUMNS, RawEnrollment, RawEnrollmentNested, decode_all},
  repo::{
    find::{Criterion, find},
    organizations, uidentities,
  },
};

pub fn get(conn: &Connection, id: i64) -> Result<Option<Enrollment>> {
  let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1");
  query_opt(conn, &sql, [id], RawEnrollment::from_row)?
    .map(RawEnrollment::into_enrollment)
    .transpose()
}

pub fn require(conn: &Connection, id: i64) -> Result<Enrollment> {
  get(conn, id)?.ok_or_else(|| affil_core::Error::NotFound(format!("enrollment {id}")).into())
}

/// Enrollments of `uuid` in one organization, ordered by interval.
pub fn find_for(
  conn: &Connection,
  uuid: &str,
  organization_id: i64,
  missing_fatal: bool,
) -> Result<Vec<Enrollment>> {
  let mut rows = decode_all(
    find(
      conn,
      "enrollments",
      ENROLLMENT_COLUMNS,
      &[Criterion::text("uuid", uuid), Criterion::int("organization_id", organization_id)],
      missing_fatal,
      RawEnrollment::from_row,
    )?,
    RawEnrollment::into_enrollment,
  )?;
  rows.sort_by_key(|e| (e.start, e.end, e.id));
  Ok(rows)
}

pub fn by_uuid(conn: &Connection, uuid: &str) -> Result<Vec<Enrollment>> {
  let sql = format!(
    "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE uuid = ?1
     ORDER BY organization_id, start, `end`"
  );
  decode_all(query(conn, &sql, [uuid], RawEnrollment::from_row)?, RawEnrollment::into_enrollment)
}

/// Enrollments of `uuid` with organization names, ordered by
/// `(start, end, organization name)`.
pub fn nested_by_uuid(conn: &Connection, uuid: &str) -> Result<Vec<EnrollmentNested>> {
  let rows = query(
    conn,
    "SELECT e.id, e.uuid, e.organization_id, e.start, e.`end`, o.name
     FROM enrollments e JOIN organizations o ON o.id = e.organization_id
     WHERE e.uuid = ?1
     ORDER BY e.start, e.`end`, o.name",
    [uuid],
    RawEnrollmentNested::from_row,
  )?;
  decode_all(rows, RawEnrollmentNested::into_enrollment_nested)
}

/// Whether `(uuid, organization, start, end)` is already recorded.
pub fn identical_exists(
  conn: &Connection,
  uuid: &str,
  organization_id: i64,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
) -> Result<bool> {
  let found = find(
    conn,
    "enrollments",
    "id",
    &[
      Criterion::text("uuid", uuid),
      Criterion::int("organization_id", organization_id),
      Criterion::Date("start", start),
      Criterion::Date("`end`", end),
    ],
    false,
    |row| row.get::<_, i64>(0),
  )?;
  Ok(!found.is_empty())
}

/// Insert a row without validation or touching.
pub(crate) fn insert(
  conn: &Connection,
  uuid: &str,
  organization_id: i64,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
) -> Result<i64> {
  let res = exec(
    conn,
    "INSERT INTO enrollments (uuid, organization_id, start, `end`)
     VALUES (?1, ?2,
             str_to_date(?3, '%Y-%m-%dT%H:%i:%s.%fZ'),
             str_to_date(?4, '%Y-%m-%dT%H:%i:%s.%fZ'))",
    params![uuid, organization_id, encode_dt(start), encode_dt(end)],
  )?;
  Ok(res.last_insert_id)
}

pub(crate) fn delete_row(conn: &Connection, id: i64) -> Result<()> {
  let res = exec(conn, "DELETE FROM enrollments WHERE id = ?1", [id])?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("enrollment {id}")).into());
  }
  Ok(())
}

pub fn add(conn: &Connection, new: &NewEnrollment, refresh: bool) -> Result<Enrollment> {
  new.validate()?;
  uidentities::require(conn, &new.uuid)?;
  organizations::require(conn, new.organization_id)?;
  let (start, end) = new.interval();
  if identical_exists(conn, &new.uuid, new.organization_id, start, end)? {
    return Err(
      affil_core::Error::Conflict(format!(
        "enrollment of '{}' in organization {} from {} to {} already exists",
        new.uuid,
        new.organization_id,
        start.to_rfc3339(),
        end.to_rfc3339()
      ))
      .into(),
    );
  }
  let id = insert(conn, &new.uuid, new.organization_id, start, end)?;
  touch(conn, &new.uuid)?;
  if refresh {
    require(conn, id)
  } else {
    Ok(Enrollment { id, uuid: new.uuid.clone(), organization_id: new.organization_id, start, end })
  }
}

/// Overwrite organization and interval of an existing enrollment.
pub fn edit(conn: &Connection, enrollment: &Enrollment, refresh: bool) -> Result<Enrollment> {
  organizations::require(conn, enrollment.organization_id)?;
  let res = exec(
    conn,
    "UPDATE enrollments
     SET organization_id = ?2,
         start = str_to_date(?3, '%Y-%m-%dT%H:%i:%s.%fZ'),
         `end` = str_to_date(?4, '%Y-%m-%dT%H:%i:%s.%fZ')
     WHERE id = ?1",
    params![
      enrollment.id,
      enrollment.organization_id,
      encode_dt(enrollment.start),
      encode_dt(enrollment.end)
    ],
  )?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("enrollment {}", enrollment.id)).into());
  }
  touch(conn, &enrollment.uuid)?;
  if refresh { require(conn, enrollment.id) } else { Ok(enrollment.clone()) }
}

pub fn delete(conn: &Connection, id: i64) -> Result<Enrollment> {
  let current = require(conn, id)?;
  delete_row(conn, id)?;
  touch(conn, &current.uuid)?;
  Ok(current)
}

/// Delete every enrollment of `uuid` in one organization.
pub fn delete_for(conn: &Connection, uuid: &str, organization_id: i64) -> Result<usize> {
  uidentities::require(conn, uuid)?;
  let res = exec(
    conn,
    "DELETE FROM enrollments WHERE uuid = ?1 AND organization_id = ?2",
    params![uuid, organization_id],
  )?;
  if res.rows_affected == 0 {
    return Err(
      affil_core::Error::NotFound(format!(
        "enrollments of '{uuid}' in organization {organization_id}"
      ))
      .into(),
    );
  }
  touch(conn, uuid)?;
  Ok(res.rows_affected)
}

/// Point an enrollment at another unique identity; the caller touches.
pub fn set_uuid(conn: &Connection, id: i64, uuid: &str) -> Result<()> {
  let res = exec(conn, "UPDATE enrollments SET uuid = ?2 WHERE id = ?1", params![id, uuid])?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("enrollment {id}")).into());
  }
  Ok(())
}
