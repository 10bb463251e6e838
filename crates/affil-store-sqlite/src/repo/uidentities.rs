use affil_core::model::UniqueIdentity;
use rusqlite::Connection;

use crate::{
  Result,
  db::{exec, query_opt},
  encode::RawUniqueIdentity,
};

pub fn get(conn: &Connection, uuid: &str) -> Result<Option<UniqueIdentity>> {
  query_opt(
    conn,
    "SELECT uuid, last_modified FROM uidentities WHERE uuid = ?1",
    [uuid],
    RawUniqueIdentity::from_row,
  )?
  .map(RawUniqueIdentity::into_unique_identity)
  .transpose()
}

pub fn require(conn: &Connection, uuid: &str) -> Result<UniqueIdentity> {
  get(conn, uuid)?
    .ok_or_else(|| affil_core::Error::NotFound(format!("unique identity '{uuid}'")).into())
}

pub fn add(conn: &Connection, uuid: &str) -> Result<UniqueIdentity> {
  if uuid.trim().is_empty() {
    return Err(affil_core::Error::validation("uuid", "cannot be empty").into());
  }
  if get(conn, uuid)?.is_some() {
    return Err(
      affil_core::Error::Conflict(format!("unique identity '{uuid}' already exists")).into(),
    );
  }
  exec(conn, "INSERT INTO uidentities (uuid, last_modified) VALUES (?1, now())", [uuid])?;
  require(conn, uuid)
}

/// Delete a unique identity. Profile, identities and enrollments cascade.
pub fn delete(conn: &Connection, uuid: &str) -> Result<()> {
  let res = exec(conn, "DELETE FROM uidentities WHERE uuid = ?1", [uuid])?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("unique identity '{uuid}'")).into());
  }
  Ok(())
}
