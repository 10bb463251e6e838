//! Organizations and the domains bound to them.

use affil_core::model::{Domain, Organization, validate_id, validate_organization_name};
use rusqlite::{Connection, params};

use crate::{
  Result,
  db::{exec, query, query_opt},
  encode::{DOMAIN_COLUMNS, ORGANIZATION_COLUMNS, domain_from_row, organization_from_row},
};

pub fn get(conn: &Connection, id: i64) -> Result<Option<Organization>> {
  let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = ?1");
  query_opt(conn, &sql, [id], organization_from_row)
}

pub fn require(conn: &Connection, id: i64) -> Result<Organization> {
  get(conn, id)?.ok_or_else(|| affil_core::Error::NotFound(format!("organization {id}")).into())
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Organization>> {
  let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE name = ?1");
  query_opt(conn, &sql, [name], organization_from_row)
}

pub fn require_by_name(conn: &Connection, name: &str) -> Result<Organization> {
  find_by_name(conn, name)?
    .ok_or_else(|| affil_core::Error::NotFound(format!("organization '{name}'")).into())
}

fn ensure_name_free(conn: &Connection, name: &str, except: Option<i64>) -> Result<()> {
  match find_by_name(conn, name)? {
    Some(org) if Some(org.id) != except => Err(
      affil_core::Error::Conflict(format!("organization '{name}' already exists")).into(),
    ),
    _ => Ok(()),
  }
}

pub fn add(conn: &Connection, name: &str, refresh: bool) -> Result<Organization> {
  validate_organization_name(name)?;
  ensure_name_free(conn, name, None)?;
  let res = exec(conn, "INSERT INTO organizations (name) VALUES (?1)", [name])?;
  let org = Organization { id: res.last_insert_id, name: name.to_owned() };
  if refresh { require(conn, org.id) } else { Ok(org) }
}

pub fn edit(conn: &Connection, id: i64, name: &str, refresh: bool) -> Result<Organization> {
  validate_id("id", id)?;
  validate_organization_name(name)?;
  require(conn, id)?;
  ensure_name_free(conn, name, Some(id))?;
  exec(conn, "UPDATE organizations SET name = ?2 WHERE id = ?1", params![id, name])?;
  if refresh { require(conn, id) } else { Ok(Organization { id, name: name.to_owned() }) }
}

/// Delete an organization; domains and enrollments cascade.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
  let res = exec(conn, "DELETE FROM organizations WHERE id = ?1", [id])?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("organization {id}")).into());
  }
  Ok(())
}

// ─── Domains ─────────────────────────────────────────────────────────────────

pub fn find_domain(conn: &Connection, organization_id: i64, domain: &str) -> Result<Option<Domain>> {
  let sql = format!(
    "SELECT {DOMAIN_COLUMNS} FROM domains_organizations d
     JOIN organizations o ON o.id = d.organization_id
     WHERE d.organization_id = ?1 AND d.domain = ?2"
  );
  query_opt(conn, &sql, params![organization_id, domain], domain_from_row)
}

pub fn add_domain(
  conn: &Connection,
  org: &Organization,
  domain: &str,
  is_top_domain: bool,
) -> Result<Domain> {
  if domain.trim().is_empty() {
    return Err(affil_core::Error::validation("domain", "cannot be empty").into());
  }
  let res = exec(
    conn,
    "INSERT INTO domains_organizations (organization_id, domain, is_top_domain)
     VALUES (?1, ?2, ?3)",
    params![org.id, domain, is_top_domain],
  )?;
  Ok(Domain {
    id: res.last_insert_id,
    organization_id: org.id,
    organization_name: org.name.clone(),
    domain: domain.to_owned(),
    is_top_domain,
  })
}

pub fn delete_domain(conn: &Connection, organization_id: i64, domain: &str) -> Result<()> {
  let res = exec(
    conn,
    "DELETE FROM domains_organizations WHERE organization_id = ?1 AND domain = ?2",
    params![organization_id, domain],
  )?;
  if res.rows_affected == 0 {
    return Err(
      affil_core::Error::NotFound(format!("domain '{domain}' of organization {organization_id}"))
        .into(),
    );
  }
  Ok(())
}

/// Organizations `uuid` currently has enrollments in, by id.
pub fn enrolled_ids(conn: &Connection, uuid: &str) -> Result<Vec<i64>> {
  query(
    conn,
    "SELECT DISTINCT organization_id FROM enrollments WHERE uuid = ?1 ORDER BY organization_id",
    [uuid],
    |row| row.get(0),
  )
}
