//! Equality-AND lookups over a single table.

use affil_core::dates::encode_dt;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params_from_iter, types::Value};

use crate::{
  Result,
  db::{DATE_FORMAT, query},
};

/// One `column = value` predicate.
#[derive(Debug, Clone)]
pub enum Criterion {
  Eq(&'static str, Value),
  /// Compared after parsing the bound value as a date.
  Date(&'static str, DateTime<Utc>),
  /// `column IS NULL`
  Null(&'static str),
}

impl Criterion {
  pub fn text(column: &'static str, value: impl Into<String>) -> Self {
    Criterion::Eq(column, Value::Text(value.into()))
  }

  pub fn int(column: &'static str, value: i64) -> Self { Criterion::Eq(column, Value::Integer(value)) }

  fn render(&self, n: usize, values: &mut Vec<Value>) -> String {
    match self {
      Criterion::Eq(column, value) => {
        values.push(value.clone());
        format!("{column} = ?{n}")
      }
      Criterion::Date(column, dt) => {
        values.push(Value::Text(encode_dt(*dt)));
        format!("{column} = str_to_date(?{n}, '{DATE_FORMAT}')")
      }
      Criterion::Null(column) => format!("{column} IS NULL"),
    }
  }

  fn describe(&self) -> String {
    match self {
      Criterion::Eq(column, Value::Text(v)) => format!("{column}='{v}'"),
      Criterion::Eq(column, Value::Integer(v)) => format!("{column}={v}"),
      Criterion::Eq(column, other) => format!("{column}={other:?}"),
      Criterion::Date(column, dt) => format!("{column}={}", dt.to_rfc3339()),
      Criterion::Null(column) => format!("{column} is null"),
    }
  }
}

/// Select `columns` from `table` where every criterion holds. With
/// `missing_fatal`, an empty result is `NotFound`.
pub fn find<T, F>(
  conn: &Connection,
  table: &str,
  columns: &str,
  criteria: &[Criterion],
  missing_fatal: bool,
  f: F,
) -> Result<Vec<T>>
where
  F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
  let mut values = Vec::with_capacity(criteria.len());
  let predicates: Vec<String> = criteria
    .iter()
    .map(|c| {
      let n = values.len() + 1;
      c.render(n, &mut values)
    })
    .collect();
  let mut sql = format!("SELECT {columns} FROM {table}");
  if !predicates.is_empty() {
    sql.push_str(" WHERE ");
    sql.push_str(&predicates.join(" AND "));
  }
  sql.push_str(" ORDER BY 1");

  let rows = query(conn, &sql, params_from_iter(values.iter()), f)?;
  if rows.is_empty() && missing_fatal {
    let what: Vec<String> = criteria.iter().map(Criterion::describe).collect();
    return Err(affil_core::Error::NotFound(format!("{table} with {}", what.join(", "))).into());
  }
  Ok(rows)
}
