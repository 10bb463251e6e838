//! Relational adapter: connection set-up, the MySQL-compatible scalar
//! functions the SQL relies on, and the query/exec primitives every
//! repository module goes through.

use affil_core::dates::encode_dt;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{Connection, Params, Row, functions::FunctionFlags};

use crate::{Result, countries::COUNTRIES, schema::SCHEMA};

/// Format string for every date bound into SQL.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%i:%s.%fZ";

// ─── Scalar functions ────────────────────────────────────────────────────────

/// Translate a MySQL date format into a chrono one.
fn chrono_format(mysql: &str) -> String {
  let mut out = String::with_capacity(mysql.len() + 4);
  let mut chars = mysql.chars().peekable();
  while let Some(c) = chars.next() {
    match (c, chars.peek().copied()) {
      ('.', Some('%')) => {
        let mut ahead = chars.clone();
        ahead.next();
        if ahead.peek() == Some(&'f') {
          chars.next();
          chars.next();
          out.push_str("%.f");
        } else {
          out.push('.');
        }
      }
      ('%', Some(spec)) => {
        chars.next();
        match spec {
          'i' => out.push_str("%M"),
          's' => out.push_str("%S"),
          'f' => out.push_str("%6f"),
          other => {
            out.push('%');
            out.push(other);
          }
        }
      }
      _ => out.push(c),
    }
  }
  out
}

/// `str_to_date(value, format)`: NULL when the value does not parse.
pub fn str_to_date(value: &str, mysql_format: &str) -> Option<String> {
  let format = chrono_format(mysql_format);
  NaiveDateTime::parse_from_str(value, &format)
    .ok()
    .or_else(|| {
      NaiveDate::parse_from_str(value, &format).ok().and_then(|d| d.and_hms_opt(0, 0, 0))
    })
    .map(|ndt| encode_dt(ndt.and_utc()))
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "str_to_date",
    2,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let value: Option<String> = ctx.get(0)?;
      let format: String = ctx.get(1)?;
      Ok(value.and_then(|v| str_to_date(&v, &format)))
    },
  )?;
  conn.create_scalar_function("now", 0, FunctionFlags::SQLITE_UTF8, |_| {
    Ok(encode_dt(Utc::now()))
  })?;
  Ok(())
}

/// Register functions, create the schema and seed reference data.
pub fn init(conn: &mut Connection) -> rusqlite::Result<()> {
  register_functions(conn)?;
  conn.execute_batch(SCHEMA)?;
  let tx = conn.transaction()?;
  {
    let mut stmt =
      tx.prepare("INSERT OR IGNORE INTO countries (code, name, alpha3) VALUES (?1, ?2, ?3)")?;
    for (code, name, alpha3) in COUNTRIES {
      stmt.execute(rusqlite::params![code, name, alpha3])?;
    }
  }
  tx.commit()
}

// ─── Primitives ──────────────────────────────────────────────────────────────

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exec {
  pub rows_affected:  usize,
  pub last_insert_id: i64,
}

pub fn exec<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Exec> {
  tracing::trace!(sql, "exec");
  let rows_affected = conn.execute(sql, params)?;
  Ok(Exec { rows_affected, last_insert_id: conn.last_insert_rowid() })
}

pub fn query<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> Result<Vec<T>>
where
  P: Params,
  F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
  tracing::trace!(sql, "query");
  let mut stmt = conn.prepare_cached(sql)?;
  let rows = stmt.query_map(params, f)?.collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn query_opt<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> Result<Option<T>>
where
  P: Params,
  F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
  Ok(query(conn, sql, params, f)?.into_iter().next())
}

/// `?n, ?n+1, ...` placeholders for an `IN (...)` list of `count` values
/// starting at parameter `first`.
pub fn placeholders(first: usize, count: usize) -> String {
  (first..first + count).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

// ─── Touch ───────────────────────────────────────────────────────────────────

/// Bump `last_modified` of one unique identity. Exactly one row must change.
pub fn touch(conn: &Connection, uuid: &str) -> Result<()> {
  let res = exec(conn, "UPDATE uidentities SET last_modified = now() WHERE uuid = ?1", [uuid])?;
  if res.rows_affected != 1 {
    return Err(
      affil_core::Error::NotFound(format!("unique identity '{uuid}'"))
        .context(format!("touch affected {} rows", res.rows_affected))
        .into(),
    );
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mysql_formats_translate() {
    assert_eq!(chrono_format(DATE_FORMAT), "%Y-%m-%dT%H:%M:%S%.fZ");
    assert_eq!(chrono_format("%Y-%m-%d %H:%i:%s"), "%Y-%m-%d %H:%M:%S");
  }

  #[test]
  fn str_to_date_canonicalises_or_returns_null() {
    assert_eq!(
      str_to_date("2012-08-01T00:00:00.000Z", DATE_FORMAT).as_deref(),
      Some("2012-08-01T00:00:00.000000Z")
    );
    assert_eq!(
      str_to_date("2012-08-01T10:20:30.123456Z", DATE_FORMAT).as_deref(),
      Some("2012-08-01T10:20:30.123456Z")
    );
    assert_eq!(
      str_to_date("2012-08-01", "%Y-%m-%d").as_deref(),
      Some("2012-08-01T00:00:00.000000Z")
    );
    assert_eq!(str_to_date("not a date", DATE_FORMAT), None);
  }

  #[test]
  fn placeholder_lists() {
    assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
    assert_eq!(placeholders(1, 0), "");
  }
}
