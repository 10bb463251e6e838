use std::time::Duration;

use affil_core::{
  Coded, ErrorKind,
  model::{Gender, PageRequest, ProfileInput},
  store::AffiliationStore,
};

use super::{identity, profile, store};

#[tokio::test]
async fn add_and_get_profile() {
  let s = store().await;
  let added = s
    .add_profile("u1".into(), ProfileInput {
      name: Some("Jane Roe".into()),
      email: Some("jane@acme.com".into()),
      gender: Some("female".into()),
      gender_acc: Some(90),
      country_code: Some("US".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  let fetched = s.get_profile("u1".into()).await.unwrap();
  assert_eq!(added, fetched);
  let p = fetched.profile.unwrap();
  assert_eq!(p.name.as_deref(), Some("Jane Roe"));
  assert_eq!(p.gender, Some(Gender::Female));
  assert_eq!(p.gender_acc, Some(90));
  assert!(!p.is_bot);
}

#[tokio::test]
async fn add_profile_twice_conflicts() {
  let s = store().await;
  profile(&s, "u1", None, None).await;
  let err = s.add_profile("u1".into(), ProfileInput::default()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn unknown_country_is_rejected() {
  let s = store().await;
  let err = s
    .add_profile("u1".into(), ProfileInput {
      country_code: Some("ZZ".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BadRequest);
  // Nothing was committed.
  assert_eq!(s.get_profile("u1".into()).await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn gender_acc_without_gender_is_rejected() {
  let s = store().await;
  let err = s
    .add_profile("u1".into(), ProfileInput { gender_acc: Some(50), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn edit_profile_keeps_unset_fields() {
  let s = store().await;
  profile(&s, "u1", Some("Jane"), Some("jane@acme.com")).await;

  let edited = s
    .edit_profile("u1".into(), ProfileInput { is_bot: Some(1), ..Default::default() })
    .await
    .unwrap();
  let p = edited.profile.unwrap();
  assert_eq!(p.name.as_deref(), Some("Jane"));
  assert_eq!(p.email.as_deref(), Some("jane@acme.com"));
  assert!(p.is_bot);
}

#[tokio::test]
async fn add_identity_touches_only_its_own_unique_identity() {
  let s = store().await;
  let u1 = profile(&s, "u1", None, None).await;
  let u2 = profile(&s, "u2", None, None).await;

  tokio::time::sleep(Duration::from_millis(5)).await;
  identity(&s, "u1", "git", "jane@acme.com").await;

  let after_u1 = s.get_profile("u1".into()).await.unwrap();
  let after_u2 = s.get_profile("u2".into()).await.unwrap();
  assert!(after_u1.last_modified > u1.last_modified);
  assert_eq!(after_u2.last_modified, u2.last_modified);
}

#[tokio::test]
async fn list_profiles_pages_and_filters() {
  let s = store().await;
  for (uuid, name) in [("a1", "Alice"), ("b2", "Bob"), ("c3", "Carol")] {
    profile(&s, uuid, Some(name), None).await;
  }

  let page = s.list_profiles(PageRequest::new(None, Some(2), Some(2))).await.unwrap();
  assert_eq!(page.n_records, 3);
  assert_eq!(page.items.len(), 1);
  assert_eq!(page.items[0].uuid, "c3");

  let page = s.list_profiles(PageRequest::new(Some("bo".into()), None, None)).await.unwrap();
  assert_eq!(page.n_records, 1);
  assert_eq!(page.items[0].uuid, "b2");

  let page = s.list_profiles(PageRequest::new(Some("uuid=a1".into()), None, None)).await.unwrap();
  assert_eq!(page.items.len(), 1);
  assert_eq!(page.items[0].uuid, "a1");
}

#[tokio::test]
async fn delete_profile_cascades() {
  let s = store().await;
  profile(&s, "u1", None, None).await;
  let id = identity(&s, "u1", "git", "jane@acme.com").await;

  s.delete_profile("u1".into(), false).await.unwrap();
  assert_eq!(s.get_profile("u1".into()).await.unwrap_err().kind(), ErrorKind::NotFound);
  assert_eq!(s.get_identity(id).await.unwrap_err().kind(), ErrorKind::NotFound);
}
