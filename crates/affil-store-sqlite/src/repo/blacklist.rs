//! The matching blacklist and the countries reference table.

use affil_core::model::{Country, MatchingBlacklist, Page, PageRequest};
use rusqlite::{Connection, params};

use crate::{
  Result,
  db::{exec, query, query_opt},
};

pub fn list(conn: &Connection, page: &PageRequest) -> Result<Page<MatchingBlacklist>> {
  let pattern = format!("%{}%", page.q.as_deref().unwrap_or_default());
  let items = query(
    conn,
    "SELECT excluded FROM matching_blacklist WHERE excluded LIKE ?1
     ORDER BY excluded LIMIT ?2 OFFSET ?3",
    params![pattern, page.rows, page.offset()],
    |row| Ok(MatchingBlacklist { excluded: row.get(0)? }),
  )?;
  let n_records = query_opt(
    conn,
    "SELECT COUNT(*) FROM matching_blacklist WHERE excluded LIKE ?1",
    [&pattern],
    |row| row.get::<_, i64>(0),
  )?
  .unwrap_or_default();
  Ok(Page::new(items, n_records, page))
}

pub fn add(conn: &Connection, email: &str) -> Result<MatchingBlacklist> {
  let email = email.trim();
  if email.is_empty() {
    return Err(affil_core::Error::validation("email", "cannot be empty").into());
  }
  let known =
    query_opt(conn, "SELECT 1 FROM matching_blacklist WHERE excluded = ?1", [email], |_| Ok(()))?;
  if known.is_some() {
    return Err(
      affil_core::Error::Conflict(format!("'{email}' is already blacklisted")).into(),
    );
  }
  exec(conn, "INSERT INTO matching_blacklist (excluded) VALUES (?1)", [email])?;
  Ok(MatchingBlacklist { excluded: email.to_owned() })
}

pub fn delete(conn: &Connection, email: &str) -> Result<()> {
  let res = exec(conn, "DELETE FROM matching_blacklist WHERE excluded = ?1", [email.trim()])?;
  if res.rows_affected == 0 {
    return Err(
      affil_core::Error::NotFound(format!("matching blacklist entry '{email}'")).into(),
    );
  }
  Ok(())
}

pub fn countries(conn: &Connection) -> Result<Vec<Country>> {
  query(conn, "SELECT code, name, alpha3 FROM countries ORDER BY code", [], |row| {
    Ok(Country { code: row.get(0)?, name: row.get(1)?, alpha3: row.get(2)? })
  })
}
