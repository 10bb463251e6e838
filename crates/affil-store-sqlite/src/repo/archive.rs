//! Archive twins.
//!
//! Each archivable table `E` has an `E_archive` with the same columns plus
//! `archived_at`. A multi-step operation stamps every row it archives with one
//! `archived_at` (a checkpoint), which is what makes it reversible.

use std::fmt::Display;

use affil_core::dates::encode_dt;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql, params};

use crate::{
  Error, Result,
  db::{DATE_FORMAT, exec, query, query_opt},
  encode::decode_dt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archived {
  UniqueIdentity,
  Profile,
  Identity,
  Enrollment,
  Organization,
}

impl Archived {
  pub fn table(self) -> &'static str {
    match self {
      Archived::UniqueIdentity => "uidentities",
      Archived::Profile => "profiles",
      Archived::Identity => "identities",
      Archived::Enrollment => "enrollments",
      Archived::Organization => "organizations",
    }
  }

  fn key(self) -> &'static str {
    match self {
      Archived::UniqueIdentity | Archived::Profile => "uuid",
      Archived::Identity | Archived::Enrollment | Archived::Organization => "id",
    }
  }

  fn columns(self) -> &'static str {
    match self {
      Archived::UniqueIdentity => "uuid, last_modified",
      Archived::Profile => "uuid, name, email, gender, gender_acc, is_bot, country_code",
      Archived::Identity => "id, uuid, source, name, email, username, last_modified",
      Archived::Enrollment => "id, uuid, organization_id, start, `end`",
      Archived::Organization => "id, name",
    }
  }
}

fn mismatch(kind: Archived, key: impl Display, what: &str, n: usize) -> Error {
  affil_core::Error::Internal(format!(
    "{what} {} {key}: affected {n} rows, expected 1",
    kind.table()
  ))
  .into()
}

/// Copy the live row `key` into the archive, stamped `at`.
pub fn archive<K: ToSql + Display>(
  conn: &Connection,
  kind: Archived,
  key: K,
  at: DateTime<Utc>,
) -> Result<()> {
  let (table, cols) = (kind.table(), kind.columns());
  let sql = format!(
    "INSERT INTO {table}_archive ({cols}, archived_at)
     SELECT {cols}, str_to_date(?2, '{DATE_FORMAT}') FROM {table} WHERE {} = ?1",
    kind.key()
  );
  let res = exec(conn, &sql, params![key, encode_dt(at)])?;
  if res.rows_affected != 1 {
    return Err(mismatch(kind, key, "archiving", res.rows_affected));
  }
  Ok(())
}

/// The archive row for `key`: the one stamped `at`, or the newest.
fn archive_row<K: ToSql>(
  conn: &Connection,
  kind: Archived,
  key: &K,
  at: Option<DateTime<Utc>>,
) -> Result<Option<i64>> {
  let table = kind.table();
  let key_col = kind.key();
  match at {
    Some(at) => query_opt(
      conn,
      &format!(
        "SELECT archive_id FROM {table}_archive
         WHERE {key_col} = ?1 AND archived_at = str_to_date(?2, '{DATE_FORMAT}')
         ORDER BY archive_id DESC LIMIT 1"
      ),
      params![key, encode_dt(at)],
      |row| row.get(0),
    ),
    None => query_opt(
      conn,
      &format!(
        "SELECT archive_id FROM {table}_archive WHERE {key_col} = ?1
         ORDER BY archived_at DESC, archive_id DESC LIMIT 1"
      ),
      params![key],
      |row| row.get(0),
    ),
  }
}

/// Reinstate `key` from its archive row stamped `at` (newest if `None`).
///
/// With `replace`, the live row is deleted first; its absence is not an
/// error. The consumed archive row is deleted afterwards.
pub fn unarchive<K: ToSql + Display>(
  conn: &Connection,
  kind: Archived,
  key: K,
  replace: bool,
  at: Option<DateTime<Utc>>,
) -> Result<()> {
  let (table, cols, key_col) = (kind.table(), kind.columns(), kind.key());
  let archive_id = archive_row(conn, kind, &key, at)?.ok_or_else(|| {
    Error::from(affil_core::Error::NotFound(format!("archived {table} {key}")))
  })?;

  if replace {
    exec(conn, &format!("DELETE FROM {table} WHERE {key_col} = ?1"), params![key])?;
  }
  let res = exec(
    conn,
    &format!("INSERT INTO {table} ({cols}) SELECT {cols} FROM {table}_archive WHERE archive_id = ?1"),
    [archive_id],
  )?;
  if res.rows_affected != 1 {
    return Err(mismatch(kind, key, "unarchiving", res.rows_affected));
  }
  let res = exec(conn, &format!("DELETE FROM {table}_archive WHERE archive_id = ?1"), [archive_id])?;
  if res.rows_affected != 1 {
    return Err(mismatch(kind, key, "dropping archived", res.rows_affected));
  }
  Ok(())
}

/// Delete archive rows of `key`: the one stamped `at`, else the newest when
/// `only_last`, else all of them.
pub fn delete_archive<K: ToSql + Display>(
  conn: &Connection,
  kind: Archived,
  key: K,
  missing_fatal: bool,
  only_last: bool,
  at: Option<DateTime<Utc>>,
) -> Result<usize> {
  let (table, key_col) = (kind.table(), kind.key());
  let deleted = if at.is_some() || only_last {
    match archive_row(conn, kind, &key, at)? {
      Some(id) => {
        exec(conn, &format!("DELETE FROM {table}_archive WHERE archive_id = ?1"), [id])?
          .rows_affected
      }
      None => 0,
    }
  } else {
    exec(conn, &format!("DELETE FROM {table}_archive WHERE {key_col} = ?1"), params![key])?
      .rows_affected
  };
  if deleted == 0 && missing_fatal {
    return Err(affil_core::Error::NotFound(format!("archived {table} {key}")).into());
  }
  Ok(deleted)
}

/// Newest `archived_at` of `key`, if it was ever archived.
pub fn newest_archived_at<K: ToSql>(
  conn: &Connection,
  kind: Archived,
  key: K,
) -> Result<Option<DateTime<Utc>>> {
  let sql = format!(
    "SELECT MAX(archived_at) FROM {}_archive WHERE {} = ?1",
    kind.table(),
    kind.key()
  );
  let newest: Option<String> = query_opt(conn, &sql, params![key], |row| row.get(0))?.flatten();
  newest.as_deref().map(decode_dt).transpose()
}

/// Distinct unique identities archived at checkpoint `at`.
pub fn uuids_archived_at(conn: &Connection, at: DateTime<Utc>) -> Result<Vec<String>> {
  query(
    conn,
    &format!(
      "SELECT DISTINCT uuid FROM uidentities_archive
       WHERE archived_at = str_to_date(?1, '{DATE_FORMAT}') ORDER BY uuid"
    ),
    [encode_dt(at)],
    |row| row.get(0),
  )
}

// ─── Sub-graph checkpoint ────────────────────────────────────────────────────

/// Archive `uuid` with its profile, identities and enrollments, all at `at`.
pub fn archive_uuid(conn: &Connection, uuid: &str, at: DateTime<Utc>) -> Result<()> {
  archive(conn, Archived::UniqueIdentity, uuid, at)?;
  archive(conn, Archived::Profile, uuid, at)?;
  let identities: Vec<String> =
    query(conn, "SELECT id FROM identities WHERE uuid = ?1 ORDER BY id", [uuid], |r| r.get(0))?;
  for id in identities {
    archive(conn, Archived::Identity, id, at)?;
  }
  let enrollments: Vec<i64> =
    query(conn, "SELECT id FROM enrollments WHERE uuid = ?1 ORDER BY id", [uuid], |r| r.get(0))?;
  for id in enrollments {
    archive(conn, Archived::Enrollment, id, at)?;
  }
  tracing::debug!(uuid, archived_at = %encode_dt(at), "archived unique identity");
  Ok(())
}

/// Inverse of [`archive_uuid`]: reinstate everything stamped `at` under
/// `uuid`, replacing live rows.
pub fn unarchive_uuid(conn: &Connection, uuid: &str, at: DateTime<Utc>) -> Result<()> {
  let stamp = encode_dt(at);
  // Replacing the unique identity cascades its live children away.
  unarchive(conn, Archived::UniqueIdentity, uuid, true, Some(at))?;
  unarchive(conn, Archived::Profile, uuid, true, Some(at))?;

  let identities: Vec<String> = query(
    conn,
    &format!(
      "SELECT DISTINCT id FROM identities_archive
       WHERE uuid = ?1 AND archived_at = str_to_date(?2, '{DATE_FORMAT}') ORDER BY id"
    ),
    params![uuid, stamp],
    |r| r.get(0),
  )?;
  for id in identities {
    unarchive(conn, Archived::Identity, id, true, Some(at))?;
  }

  let enrollments: Vec<i64> = query(
    conn,
    &format!(
      "SELECT DISTINCT id FROM enrollments_archive
       WHERE uuid = ?1 AND archived_at = str_to_date(?2, '{DATE_FORMAT}') ORDER BY id"
    ),
    params![uuid, stamp],
    |r| r.get(0),
  )?;
  for id in enrollments {
    unarchive(conn, Archived::Enrollment, id, true, Some(at))?;
  }
  tracing::debug!(uuid, archived_at = %stamp, "unarchived unique identity");
  Ok(())
}
