//! Every mutation bumps `last_modified` of the unique identity it changes and
//! of no other.

use std::time::Duration;

use affil_core::{
  model::{EnrollmentUpdate, IdentityUpdate, ProfileInput, PutOrgDomainOptions},
  store::AffiliationStore,
};
use chrono::{DateTime, Utc};

use super::{date, enroll, identity, org, profile, store};
use crate::SqliteStore;

async fn stamp(s: &SqliteStore, uuid: &str) -> DateTime<Utc> {
  s.get_profile(uuid.into()).await.expect("profile").last_modified
}

/// Run `change` and check that it touched `u1` and left `u2` alone.
async fn assert_touches_u1_only(s: &SqliteStore, change: impl Future<Output = ()>) {
  let (u1, u2) = (stamp(s, "u1").await, stamp(s, "u2").await);
  tokio::time::sleep(Duration::from_millis(10)).await;
  change.await;
  assert!(stamp(s, "u1").await > u1, "u1 was not touched");
  assert_eq!(stamp(s, "u2").await, u2, "u2 was touched");
}

async fn two_profiles() -> SqliteStore {
  let s = store().await;
  profile(&s, "u1", Some("Jane"), Some("jane@acme.com")).await;
  profile(&s, "u2", Some("Bob"), Some("bob@acme.com")).await;
  s
}

#[tokio::test]
async fn edit_profile_touches() {
  let s = two_profiles().await;
  assert_touches_u1_only(&s, async {
    let input = ProfileInput { name: Some("Jane Roe".into()), ..Default::default() };
    s.edit_profile("u1".into(), input).await.unwrap();
  })
  .await;
}

#[tokio::test]
async fn edit_identity_touches() {
  let s = two_profiles().await;
  let id = identity(&s, "u1", "git", "jane@acme.com").await;
  assert_touches_u1_only(&s, async {
    let update = IdentityUpdate {
      source: "git".into(),
      email: Some("jane@acme.com".into()),
      username: Some("jane".into()),
      ..Default::default()
    };
    s.edit_identity(id, update).await.unwrap();
  })
  .await;
}

#[tokio::test]
async fn delete_identity_touches() {
  let s = two_profiles().await;
  let id = identity(&s, "u1", "git", "jane@acme.com").await;
  assert_touches_u1_only(&s, async {
    s.delete_identity(id, false).await.unwrap();
  })
  .await;
}

#[tokio::test]
async fn add_enrollment_touches() {
  let s = two_profiles().await;
  let acme = org(&s, "Acme").await;
  assert_touches_u1_only(&s, async {
    enroll(&s, "u1", &acme, None, None).await;
  })
  .await;
}

#[tokio::test]
async fn edit_enrollment_touches() {
  let s = two_profiles().await;
  let acme = org(&s, "Acme").await;
  let id = enroll(&s, "u1", &acme, None, None).await.enrollments[0].id;
  assert_touches_u1_only(&s, async {
    let update = EnrollmentUpdate { start: Some(date(2015, 1, 1)), ..Default::default() };
    s.edit_enrollment(id, update, false).await.unwrap();
  })
  .await;
}

#[tokio::test]
async fn delete_enrollment_touches() {
  let s = two_profiles().await;
  let acme = org(&s, "Acme").await;
  let id = enroll(&s, "u1", &acme, None, None).await.enrollments[0].id;
  assert_touches_u1_only(&s, async {
    s.delete_enrollment(id, false).await.unwrap();
  })
  .await;
}

#[tokio::test]
async fn delete_enrollments_touches() {
  let s = two_profiles().await;
  let acme = org(&s, "Acme").await;
  enroll(&s, "u1", &acme, Some(date(2010, 1, 1)), Some(date(2012, 1, 1))).await;
  enroll(&s, "u1", &acme, Some(date(2014, 1, 1)), Some(date(2016, 1, 1))).await;
  assert_touches_u1_only(&s, async {
    s.delete_enrollments("u1".into(), acme.id).await.unwrap();
  })
  .await;
}

#[tokio::test]
async fn put_org_domain_touches_only_newly_enrolled() {
  let s = two_profiles().await;
  org(&s, "Acme").await;
  // u2 matches the domain too, but is already enrolled and is left alone.
  let other = org(&s, "Other").await;
  enroll(&s, "u2", &other, None, None).await;

  assert_touches_u1_only(&s, async {
    let out = s
      .put_org_domain("Acme".into(), "acme.com".into(), PutOrgDomainOptions::default())
      .await
      .unwrap();
    assert_eq!(out.added, 1);
  })
  .await;
}
