//! Integration tests for `SqliteStore` against an in-memory database.

use affil_core::{
  model::{NewEnrollment, NewIdentity, Organization, ProfileInput, UniqueIdentityNested},
  store::AffiliationStore,
};
use chrono::{DateTime, TimeZone, Utc};

use crate::SqliteStore;

mod enrollments;
mod maintenance;
mod profiles;
mod touch;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().expect("valid date")
}

/// Run a single-value query directly against the database.
async fn scalar(s: &SqliteStore, sql: &'static str) -> i64 {
  s.conn
    .call(move |c| Ok(c.query_row(sql, [], |r| r.get::<_, i64>(0))?))
    .await
    .expect("scalar query")
}

async fn profile(s: &SqliteStore, uuid: &str, name: Option<&str>, email: Option<&str>) -> UniqueIdentityNested {
  s.add_profile(uuid.into(), ProfileInput {
    name: name.map(Into::into),
    email: email.map(Into::into),
    ..Default::default()
  })
  .await
  .expect("add profile")
}

async fn identity(s: &SqliteStore, uuid: &str, source: &str, email: &str) -> String {
  let nested = s
    .add_identity(NewIdentity {
      uuid: Some(uuid.into()),
      source: source.into(),
      email: Some(email.into()),
      ..Default::default()
    })
    .await
    .expect("add identity");
  nested
    .identities
    .iter()
    .find(|i| i.source == source && i.email.as_deref() == Some(email))
    .map(|i| i.id.clone())
    .expect("identity present")
}

async fn org(s: &SqliteStore, name: &str) -> Organization {
  s.add_organization(name.into()).await.expect("add organization")
}

async fn enroll(
  s: &SqliteStore,
  uuid: &str,
  org: &Organization,
  start: Option<DateTime<Utc>>,
  end: Option<DateTime<Utc>>,
) -> UniqueIdentityNested {
  s.add_enrollment(
    NewEnrollment { uuid: uuid.into(), organization_id: org.id, start, end },
    false,
  )
  .await
  .expect("add enrollment")
}
