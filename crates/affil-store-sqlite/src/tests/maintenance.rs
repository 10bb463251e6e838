use affil_core::{
  Coded, ErrorKind,
  affiliations::{
    AffiliationEnrollment, AffiliationIdentity, AffiliationProfile, BulkUpdate, HideEmailsOutput,
  },
  model::NewIdentity,
  store::AffiliationStore,
};

use super::{date, enroll, identity, org, profile, scalar, store};

fn git(email: &str) -> NewIdentity {
  NewIdentity { source: "git".into(), email: Some(email.into()), ..Default::default() }
}

fn dumped(uuid: &str, email: &str, organization: &str) -> AffiliationProfile {
  AffiliationProfile {
    uuid:         uuid.into(),
    name:         Some("Jane Roe".into()),
    email:        Some(email.replace('@', "!")),
    gender:       Some("female".into()),
    is_bot:       false,
    country_code: None,
    identities:   vec![AffiliationIdentity {
      source:   "git".into(),
      name:     Some("Jane Roe".into()),
      email:    Some(email.replace('@', "!")),
      username: None,
    }],
    enrollments:  vec![AffiliationEnrollment {
      start:        date(2015, 1, 1),
      end:          date(2018, 1, 1),
      organization: organization.into(),
    }],
  }
}

// ─── Batch identities ────────────────────────────────────────────────────────

#[tokio::test]
async fn add_identities_groups_by_unique_identity() {
  let s = store().await;
  profile(&s, "u1", None, None).await;

  let batch = vec![
    NewIdentity { uuid: Some("u1".into()), ..git("jane@acme.com") },
    git("bob@acme.com"),
    NewIdentity { uuid: Some("u1".into()), ..git("jane@home.org") },
  ];
  let out = s.add_identities(batch).await.unwrap();
  assert_eq!(out.len(), 2);
  assert_eq!(out[0].uuid, "u1");
  assert_eq!(out[0].identities.len(), 2);
  assert_eq!(out[1].identities[0].email.as_deref(), Some("bob@acme.com"));
  assert_eq!(out[1].uuid, out[1].identities[0].id);
}

#[tokio::test]
async fn add_identities_is_all_or_nothing() {
  let s = store().await;
  let batch = vec![git("bob@acme.com"), git("bob@acme.com")];
  let err = s.add_identities(batch).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert_eq!(scalar(&s, "SELECT COUNT(*) FROM identities").await, 0);
  assert_eq!(scalar(&s, "SELECT COUNT(*) FROM uidentities").await, 0);
}

// ─── Bulk update ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_update_adds_replaces_and_deletes() {
  let s = store().await;
  profile(&s, "old", Some("Old"), None).await;
  profile(&s, "gone", Some("Gone"), None).await;
  identity(&s, "old", "gerrit", "old@acme.com").await;

  let update = BulkUpdate {
    add: vec![dumped("new", "jane@acme.com", "Acme"), dumped("old", "old@beta.io", "Beta")],
    del: vec![dumped("gone", "", "Acme"), dumped("missing", "", "Acme")],
  };
  let out = s.bulk_update(update).await.unwrap();
  assert_eq!((out.added, out.updated, out.deleted), (1, 1, 1));
  assert_eq!(
    out.summary(2, 2),
    "Requested: Add: 2, Delete: 2, Done: Added: 1, Deleted: 1, Updated: 1"
  );

  let created = s.get_profile("new".into()).await.unwrap();
  let p = created.profile.unwrap();
  assert_eq!(p.email.as_deref(), Some("jane@acme.com"));
  assert_eq!(created.identities.len(), 1);
  assert_eq!(created.enrollments[0].organization.name, "Acme");
  assert_eq!(created.enrollments[0].start, date(2015, 1, 1));

  // The previous graph of "old" is gone, organizations are created by name.
  let replaced = s.get_profile("old".into()).await.unwrap();
  assert_eq!(replaced.identities.len(), 1);
  assert_eq!(replaced.identities[0].source, "git");
  assert_eq!(replaced.enrollments[0].organization.name, "Beta");
  assert!(s.find_organization_by_name("Beta".into()).await.is_ok());

  let err = s.get_profile("gone".into()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn bulk_update_reuses_organizations_and_moves_identities() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "other", None, None).await;
  identity(&s, "other", "git", "jane@acme.com").await;
  enroll(&s, "other", &acme, None, None).await;

  let mut jane = dumped("jane", "jane@acme.com", "Acme");
  jane.identities[0].name = None;
  let update = BulkUpdate { add: vec![jane], del: vec![] };
  s.bulk_update(update).await.unwrap();

  assert_eq!(scalar(&s, "SELECT COUNT(*) FROM organizations").await, 1);
  let moved = s.get_profile("jane".into()).await.unwrap();
  assert_eq!(moved.identities.len(), 1);
  assert!(s.get_profile("other".into()).await.unwrap().identities.is_empty());
}

#[tokio::test]
async fn bulk_update_rolls_back_on_bad_entry() {
  let s = store().await;
  let mut bad = dumped("bad", "bad@acme.com", "Acme");
  bad.enrollments[0].start = date(2020, 1, 1);
  let update = BulkUpdate { add: vec![dumped("ok", "ok@acme.com", "Acme"), bad], del: vec![] };

  let err = s.bulk_update(update).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BadRequest);
  assert_eq!(scalar(&s, "SELECT COUNT(*) FROM uidentities").await, 0);
}

// ─── Hide emails ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn hide_emails_keeps_local_parts() {
  let s = store().await;
  profile(&s, "u1", Some("jane.roe@acme.com"), Some("jane.roe@acme.com")).await;
  profile(&s, "u2", Some("Bob"), None).await;
  s.add_identity(NewIdentity {
    uuid: Some("u2".into()),
    source: "github".into(),
    name: Some("Bob".into()),
    username: Some("bob@users.noreply.github.com".into()),
    ..Default::default()
  })
  .await
  .unwrap();
  let before = s.get_profile("u2".into()).await.unwrap().last_modified;

  let out = s.hide_emails().await.unwrap();
  assert_eq!((out.profiles, out.identities), (1, 1));

  let u1 = s.get_profile("u1".into()).await.unwrap().profile.unwrap();
  assert_eq!(u1.name.as_deref(), Some("jane.roe"));
  assert_eq!(u1.email.as_deref(), Some("jane.roe@acme.com"));

  let u2 = s.get_profile("u2".into()).await.unwrap();
  assert_eq!(u2.identities[0].username.as_deref(), Some("bob"));
  assert_eq!(u2.identities[0].name.as_deref(), Some("Bob"));
  assert!(u2.last_modified >= before);

  // Nothing left to hide.
  assert_eq!(s.hide_emails().await.unwrap(), HideEmailsOutput::default());
}
