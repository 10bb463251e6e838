//! Source identities.

use affil_core::model::{Identity, IdentityUpdate, NewIdentity};
use rusqlite::{Connection, params};

use crate::{
  Result,
  db::{exec, query, query_opt, touch},
  encode::{IDENTITY_COLUMNS, RawIdentity, decode_all},
  repo::uidentities,
};

pub fn get(conn: &Connection, id: &str) -> Result<Option<Identity>> {
  let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = ?1");
  query_opt(conn, &sql, [id], RawIdentity::from_row)?.map(RawIdentity::into_identity).transpose()
}

pub fn require(conn: &Connection, id: &str) -> Result<Identity> {
  get(conn, id)?.ok_or_else(|| affil_core::Error::NotFound(format!("identity '{id}'")).into())
}

/// Identities of one unique identity, ordered by source then id.
pub fn by_uuid(conn: &Connection, uuid: &str) -> Result<Vec<Identity>> {
  let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE uuid = ?1 ORDER BY source, id");
  decode_all(query(conn, &sql, [uuid], RawIdentity::from_row)?, RawIdentity::into_identity)
}

/// Whether another identity than `except` carries the same four fields.
fn identical_exists(
  conn: &Connection,
  source: &str,
  name: &Option<String>,
  email: &Option<String>,
  username: &Option<String>,
  except: Option<&str>,
) -> Result<bool> {
  let found = query_opt(
    conn,
    "SELECT 1 FROM identities
     WHERE source = ?1 AND email IS ?2 AND name IS ?3 AND username IS ?4 AND id IS NOT ?5",
    params![source, email, name, username, except],
    |_| Ok(()),
  )?;
  Ok(found.is_some())
}

/// Insert a new identity under its derived id.
pub fn add(conn: &Connection, new: &NewIdentity, refresh: bool) -> Result<Identity> {
  new.validate()?;
  let id = new.id();
  if get(conn, &id)?.is_some()
    || identical_exists(conn, &new.source, &new.name, &new.email, &new.username, None)?
  {
    return Err(affil_core::Error::Conflict(format!("identity '{id}' already exists")).into());
  }
  if let Some(uuid) = new.uuid.as_deref() {
    uidentities::require(conn, uuid)?;
  }
  exec(
    conn,
    "INSERT INTO identities (id, uuid, source, name, email, username, last_modified)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, now())",
    params![id, new.uuid, new.source, new.name, new.email, new.username],
  )?;
  if let Some(uuid) = new.uuid.as_deref() {
    touch(conn, uuid)?;
  }
  if refresh {
    require(conn, &id)
  } else {
    Ok(Identity {
      id,
      uuid: new.uuid.clone(),
      source: new.source.clone(),
      name: new.name.clone(),
      email: new.email.clone(),
      username: new.username.clone(),
      last_modified: chrono::Utc::now(),
    })
  }
}

pub fn edit(conn: &Connection, id: &str, update: &IdentityUpdate, refresh: bool) -> Result<Identity> {
  update.validate(id)?;
  let current = require(conn, id)?;
  let IdentityUpdate { source, name, email, username } = update;
  if identical_exists(conn, source, name, email, username, Some(id))? {
    let msg = format!("another identity already has the fields of '{id}'");
    return Err(affil_core::Error::Conflict(msg).into());
  }
  exec(
    conn,
    "UPDATE identities
     SET source = ?2, name = ?3, email = ?4, username = ?5, last_modified = now()
     WHERE id = ?1",
    params![id, update.source, update.name, update.email, update.username],
  )?;
  if let Some(uuid) = current.uuid.as_deref() {
    touch(conn, uuid)?;
  }
  if refresh {
    require(conn, id)
  } else {
    Ok(Identity {
      source: update.source.clone(),
      name: update.name.clone(),
      email: update.email.clone(),
      username: update.username.clone(),
      ..current
    })
  }
}

/// Delete an identity, returning the removed row.
pub fn delete(conn: &Connection, id: &str) -> Result<Identity> {
  let current = require(conn, id)?;
  exec(conn, "DELETE FROM identities WHERE id = ?1", [id])?;
  if let Some(uuid) = current.uuid.as_deref() {
    touch(conn, uuid)?;
  }
  Ok(current)
}

/// Point an identity at another unique identity. Touching is left to the
/// caller, which knows both ends of the move.
pub fn set_uuid(conn: &Connection, id: &str, uuid: &str) -> Result<()> {
  let res = exec(
    conn,
    "UPDATE identities SET uuid = ?2, last_modified = now() WHERE id = ?1",
    params![id, uuid],
  )?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("identity '{id}'")).into());
  }
  Ok(())
}
