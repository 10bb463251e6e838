//! Paged nested listings.
//!
//! Each listing first selects one page of root keys, then hydrates the
//! children of exactly those roots with a second query and groups them in
//! memory. `n_records` comes from a `COUNT` over the same filter.

use std::collections::BTreeMap;

use affil_core::model::{
  Domain, Identity, OrganizationNested, Page, PageRequest, UniqueIdentityNested,
};
use rusqlite::{Connection, params_from_iter, types::Value};

use crate::{
  Result,
  db::{placeholders, query, query_opt},
  encode::{
    DOMAIN_COLUMNS, RawEnrollmentNested, RawIdentity, RawProfile, RawUniqueIdentity, decode_all,
    domain_from_row,
  },
};

fn like(q: &str) -> Value { Value::Text(format!("%{q}%")) }

fn count(conn: &Connection, sql: &str, values: &[Value]) -> Result<i64> {
  Ok(query_opt(conn, sql, params_from_iter(values.iter()), |row| row.get(0))?.unwrap_or_default())
}

fn identity_key(i: &Identity) -> (String, String, String, String, String) {
  let lower = |s: &Option<String>| s.as_deref().unwrap_or_default().to_lowercase();
  (i.source.to_lowercase(), lower(&i.name), lower(&i.email), lower(&i.username), i.id.clone())
}

// ─── Unique identities ───────────────────────────────────────────────────────

/// Hydrate the given unique identities, ordered by uuid. Unknown uuids are
/// skipped.
pub fn hydrate_unique_identities(
  conn: &Connection,
  uuids: &[String],
) -> Result<Vec<UniqueIdentityNested>> {
  if uuids.is_empty() {
    return Ok(Vec::new());
  }
  let keys: Vec<Value> = uuids.iter().map(|u| Value::Text(u.clone())).collect();
  let list = placeholders(1, keys.len());

  let roots = query(
    conn,
    &format!(
      "SELECT u.uuid, u.last_modified, p.uuid, p.name, p.email, p.gender, p.gender_acc,
              p.is_bot, p.country_code
       FROM uidentities u LEFT JOIN profiles p ON p.uuid = u.uuid
       WHERE u.uuid IN ({list})"
    ),
    params_from_iter(keys.iter()),
    |row| {
      let uu = RawUniqueIdentity::from_row(row)?;
      let has_profile = row.get::<_, Option<String>>(2)?.is_some();
      let profile = if has_profile { Some(RawProfile::from_row_at(row, 2)?) } else { None };
      Ok((uu, profile))
    },
  )?;

  let mut out: BTreeMap<String, UniqueIdentityNested> = BTreeMap::new();
  for (uu, profile) in roots {
    let uu = uu.into_unique_identity()?;
    let profile = profile.map(RawProfile::into_profile).transpose()?;
    out.insert(uu.uuid.clone(), UniqueIdentityNested {
      uuid: uu.uuid,
      last_modified: uu.last_modified,
      profile,
      identities: Vec::new(),
      enrollments: Vec::new(),
    });
  }

  let identities = query(
    conn,
    &format!(
      "SELECT id, uuid, source, name, email, username, last_modified
       FROM identities WHERE uuid IN ({list})"
    ),
    params_from_iter(keys.iter()),
    RawIdentity::from_row,
  )?;
  for identity in decode_all(identities, RawIdentity::into_identity)? {
    if let Some(node) = identity.uuid.as_ref().and_then(|u| out.get_mut(u)) {
      node.identities.push(identity);
    }
  }

  let enrollments = query(
    conn,
    &format!(
      "SELECT e.id, e.uuid, e.organization_id, e.start, e.`end`, o.name
       FROM enrollments e JOIN organizations o ON o.id = e.organization_id
       WHERE e.uuid IN ({list})"
    ),
    params_from_iter(keys.iter()),
    RawEnrollmentNested::from_row,
  )?;
  for enrollment in decode_all(enrollments, RawEnrollmentNested::into_enrollment_nested)? {
    if let Some(node) = out.get_mut(&enrollment.uuid) {
      node.enrollments.push(enrollment);
    }
  }

  let mut out: Vec<_> = out.into_values().collect();
  for node in &mut out {
    node.identities.sort_by_cached_key(identity_key);
    node
      .enrollments
      .sort_by(|a, b| (a.start, a.end, &a.organization.name).cmp(&(b.start, b.end, &b.organization.name)));
  }
  Ok(out)
}

pub fn unique_identity(conn: &Connection, uuid: &str) -> Result<UniqueIdentityNested> {
  hydrate_unique_identities(conn, &[uuid.to_owned()])?
    .pop()
    .ok_or_else(|| affil_core::Error::NotFound(format!("unique identity '{uuid}'")).into())
}

/// Page through unique identities matching `page.q`.
///
/// `q` of the form `uuid=<value>` selects one uuid; anything else is a
/// substring match over uuid, profile and identity fields. With
/// `identity_required`, identity-less profiles are left out.
pub fn query_unique_identities(
  conn: &Connection,
  page: &PageRequest,
  identity_required: bool,
) -> Result<Page<UniqueIdentityNested>> {
  let join = if identity_required { "JOIN" } else { "LEFT JOIN" };
  let mut values = Vec::new();
  let filter = match page.q.as_deref() {
    None => String::new(),
    Some(q) => match q.strip_prefix("uuid=") {
      Some(uuid) => {
        values.push(Value::Text(uuid.trim().to_owned()));
        "WHERE u.uuid = ?1".to_owned()
      }
      None => {
        values.push(like(q));
        "WHERE u.uuid LIKE ?1 OR p.name LIKE ?1 OR p.email LIKE ?1 OR i.source LIKE ?1
           OR i.name LIKE ?1 OR i.email LIKE ?1 OR i.username LIKE ?1"
          .to_owned()
      }
    },
  };
  let from = format!(
    "FROM uidentities u JOIN profiles p ON p.uuid = u.uuid {join} identities i ON i.uuid = u.uuid {filter}"
  );

  let n_records = count(conn, &format!("SELECT COUNT(DISTINCT u.uuid) {from}"), &values)?;

  let n = values.len();
  values.push(Value::Integer(page.rows));
  values.push(Value::Integer(page.offset()));
  let uuids: Vec<String> = query(
    conn,
    &format!("SELECT DISTINCT u.uuid {from} ORDER BY u.uuid LIMIT ?{} OFFSET ?{}", n + 1, n + 2),
    params_from_iter(values.iter()),
    |row| row.get(0),
  )?;

  let items = hydrate_unique_identities(conn, &uuids)?;
  Ok(Page::new(items, n_records, page))
}

// ─── Organizations ───────────────────────────────────────────────────────────

/// Page through organizations (with their domains) whose name or one of
/// whose domains matches `page.q`.
pub fn query_organizations(conn: &Connection, page: &PageRequest) -> Result<Page<OrganizationNested>> {
  let mut values = Vec::new();
  let filter = match page.q.as_deref() {
    None => String::new(),
    Some(q) => {
      values.push(like(q));
      "WHERE o.name LIKE ?1 OR d.domain LIKE ?1".to_owned()
    }
  };
  let from = format!(
    "FROM organizations o LEFT JOIN domains_organizations d ON d.organization_id = o.id {filter}"
  );

  let n_records = count(conn, &format!("SELECT COUNT(DISTINCT o.id) {from}"), &values)?;

  let n = values.len();
  values.push(Value::Integer(page.rows));
  values.push(Value::Integer(page.offset()));
  let roots: Vec<(i64, String)> = query(
    conn,
    &format!(
      "SELECT DISTINCT o.id, o.name {from} ORDER BY o.name, o.id LIMIT ?{} OFFSET ?{}",
      n + 1,
      n + 2
    ),
    params_from_iter(values.iter()),
    |row| Ok((row.get(0)?, row.get(1)?)),
  )?;
  if roots.is_empty() {
    return Ok(Page::new(Vec::new(), n_records, page));
  }

  let ids: Vec<Value> = roots.iter().map(|(id, _)| Value::Integer(*id)).collect();
  let domains: Vec<Domain> = query(
    conn,
    &format!(
      "SELECT {DOMAIN_COLUMNS} FROM domains_organizations d
       JOIN organizations o ON o.id = d.organization_id
       WHERE d.organization_id IN ({}) ORDER BY d.domain",
      placeholders(1, ids.len())
    ),
    params_from_iter(ids.iter()),
    domain_from_row,
  )?;

  let mut by_org: BTreeMap<i64, Vec<Domain>> = BTreeMap::new();
  for d in domains {
    by_org.entry(d.organization_id).or_default().push(d);
  }
  let items = roots
    .into_iter()
    .map(|(id, name)| OrganizationNested { domains: by_org.remove(&id).unwrap_or_default(), id, name })
    .collect();
  Ok(Page::new(items, n_records, page))
}

/// Page through domains, optionally of one organization, matching `page.q`
/// against domain or organization name.
pub fn query_domains(
  conn: &Connection,
  organization_id: Option<i64>,
  page: &PageRequest,
) -> Result<Page<Domain>> {
  let mut values = Vec::new();
  let mut predicates = Vec::new();
  if let Some(id) = organization_id {
    values.push(Value::Integer(id));
    predicates.push(format!("d.organization_id = ?{}", values.len()));
  }
  if let Some(q) = page.q.as_deref() {
    values.push(like(q));
    let n = values.len();
    predicates.push(format!("(d.domain LIKE ?{n} OR o.name LIKE ?{n})"));
  }
  let filter = if predicates.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", predicates.join(" AND "))
  };
  let from =
    format!("FROM domains_organizations d JOIN organizations o ON o.id = d.organization_id {filter}");

  let n_records = count(conn, &format!("SELECT COUNT(*) {from}"), &values)?;

  let n = values.len();
  values.push(Value::Integer(page.rows));
  values.push(Value::Integer(page.offset()));
  let items = query(
    conn,
    &format!(
      "SELECT {DOMAIN_COLUMNS} {from} ORDER BY o.name, d.domain LIMIT ?{} OFFSET ?{}",
      n + 1,
      n + 2
    ),
    params_from_iter(values.iter()),
    domain_from_row,
  )?;
  Ok(Page::new(items, n_records, page))
}
