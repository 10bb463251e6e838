use affil_core::{
  Coded, ErrorKind,
  dates::{max_period, min_period},
  model::{EnrollmentUpdate, NewEnrollment},
  store::AffiliationStore,
};

use super::{date, enroll, org, profile, store};

#[tokio::test]
async fn open_bounds_default_to_the_period() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "u1", None, None).await;

  let nested = enroll(&s, "u1", &acme, None, None).await;
  let e = &nested.enrollments[0];
  assert_eq!((e.start, e.end), (min_period(), max_period()));
  assert_eq!(e.organization.name, "Acme");
}

#[tokio::test]
async fn identical_enrollment_conflicts() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "u1", None, None).await;
  enroll(&s, "u1", &acme, Some(date(2012, 1, 1)), Some(date(2013, 1, 1))).await;

  let err = s
    .add_enrollment(
      NewEnrollment {
        uuid:            "u1".into(),
        organization_id: acme.id,
        start:           Some(date(2012, 1, 1)),
        end:             Some(date(2013, 1, 1)),
      },
      false,
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn invalid_intervals_are_rejected() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "u1", None, None).await;

  for (start, end) in [
    (date(2014, 1, 1), date(2013, 1, 1)),
    (date(1899, 12, 31), date(2013, 1, 1)),
    (date(2013, 1, 1), date(2100, 1, 2)),
  ] {
    let err = s
      .add_enrollment(
        NewEnrollment {
          uuid:            "u1".into(),
          organization_id: acme.id,
          start:           Some(start),
          end:             Some(end),
        },
        false,
      )
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
  }
}

#[tokio::test]
async fn add_with_merge_collapses_overlaps() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "u1", None, None).await;
  enroll(&s, "u1", &acme, Some(date(2012, 1, 1)), Some(date(2013, 1, 1))).await;

  let nested = s
    .add_enrollment(
      NewEnrollment {
        uuid:            "u1".into(),
        organization_id: acme.id,
        start:           Some(date(2012, 6, 1)),
        end:             Some(date(2014, 1, 1)),
      },
      true,
    )
    .await
    .unwrap();
  assert_eq!(nested.enrollments.len(), 1);
  let e = &nested.enrollments[0];
  assert_eq!((e.start, e.end), (date(2012, 1, 1), date(2014, 1, 1)));
}

#[tokio::test]
async fn merge_keeps_untouched_rows() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "u1", None, None).await;
  let before = enroll(&s, "u1", &acme, Some(date(2008, 1, 1)), Some(date(2009, 1, 1))).await;
  let kept = before.enrollments[0].id;
  enroll(&s, "u1", &acme, Some(date(2012, 1, 1)), Some(date(2013, 1, 1))).await;
  enroll(&s, "u1", &acme, Some(date(2012, 6, 1)), Some(date(2014, 1, 1))).await;

  let merged = s.merge_enrollments("u1".into(), acme.id).await.unwrap();
  assert_eq!(merged.enrollments.len(), 2);
  assert_eq!(merged.enrollments[0].id, kept);
  assert_eq!(
    (merged.enrollments[1].start, merged.enrollments[1].end),
    (date(2012, 1, 1), date(2014, 1, 1))
  );
}

#[tokio::test]
async fn merge_without_enrollments_is_not_found() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  profile(&s, "u1", None, None).await;
  let err = s.merge_enrollments("u1".into(), acme.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn edit_enrollment_moves_bounds() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  let initech = org(&s, "Initech").await;
  profile(&s, "u1", None, None).await;
  let nested = enroll(&s, "u1", &acme, Some(date(2012, 1, 1)), Some(date(2013, 1, 1))).await;
  let id = nested.enrollments[0].id;

  let edited = s
    .edit_enrollment(
      id,
      EnrollmentUpdate {
        organization_id: Some(initech.id),
        start:           None,
        end:             Some(date(2015, 1, 1)),
      },
      false,
    )
    .await
    .unwrap();
  let e = &edited.enrollments[0];
  assert_eq!(e.id, id);
  assert_eq!(e.organization.name, "Initech");
  assert_eq!((e.start, e.end), (date(2012, 1, 1), date(2015, 1, 1)));

  let err = s
    .edit_enrollment(
      id,
      EnrollmentUpdate { start: Some(date(2016, 1, 1)), ..Default::default() },
      false,
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn profile_enrollments_are_sorted() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  let initech = org(&s, "Initech").await;
  profile(&s, "u1", None, None).await;
  enroll(&s, "u1", &initech, Some(date(2014, 1, 1)), Some(date(2015, 1, 1))).await;
  enroll(&s, "u1", &acme, Some(date(2010, 1, 1)), Some(date(2011, 1, 1))).await;

  let list = s.profile_enrollments("u1".into()).await.unwrap();
  let names: Vec<_> = list.iter().map(|e| e.organization.name.as_str()).collect();
  assert_eq!(names, ["Acme", "Initech"]);
}

#[tokio::test]
async fn delete_enrollments_of_one_organization() {
  let s = store().await;
  let acme = org(&s, "Acme").await;
  let initech = org(&s, "Initech").await;
  profile(&s, "u1", None, None).await;
  enroll(&s, "u1", &acme, Some(date(2010, 1, 1)), Some(date(2011, 1, 1))).await;
  enroll(&s, "u1", &acme, Some(date(2012, 1, 1)), Some(date(2013, 1, 1))).await;
  enroll(&s, "u1", &initech, None, None).await;

  let nested = s.delete_enrollments("u1".into(), acme.id).await.unwrap();
  assert_eq!(nested.enrollments.len(), 1);
  assert_eq!(nested.enrollments[0].organization_id, initech.id);

  let err = s.delete_enrollments("u1".into(), acme.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let id = nested.enrollments[0].id;
  let nested = s.delete_enrollment(id, false).await.unwrap();
  assert!(nested.enrollments.is_empty());
}
