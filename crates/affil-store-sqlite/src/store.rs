//! [`SqliteStore`]: the SQLite implementation of [`AffiliationStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use affil_core::{
  affiliations::{AffiliationProfile, BulkUpdate, BulkUpdateOutput, HideEmailsOutput},
  analytics::{Contribution, ContributorStats, UnaffiliatedContributor},
  model::{
    Country, Domain, EnrollmentNested, EnrollmentUpdate, Identity, IdentityUpdate,
    MatchingBlacklist, NewEnrollment, NewIdentity, Organization, OrganizationNested, Page,
    PageRequest, Profile, ProfileInput, PutOrgDomainOptions, PutOrgDomainOutput,
    UniqueIdentityNested, validate_id,
  },
  store::AffiliationStore,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::{
  Error, Result, db,
  engine::{self, MoveOutcome},
  repo::{blacklist, enrollments, identities, nested, organizations, profiles, uidentities},
  reports,
};

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Raises its flag when dropped. Held by the awaiting future, so a dropped
/// request cancels the database-thread work that has not committed yet.
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
  fn new() -> Self { Self(Arc::new(AtomicBool::new(false))) }

  fn flag(&self) -> Arc<AtomicBool> { self.0.clone() }
}

impl Drop for CancelOnDrop {
  fn drop(&mut self) { self.0.store(true, Ordering::Release); }
}

fn cancelled(flag: &AtomicBool) -> bool { flag.load(Ordering::Acquire) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// An affiliation store backed by a single SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted and every call
/// is shipped to its dedicated thread.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` (a file path or a `file:` URI).
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        db::init(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `op` on the database thread outside a transaction.
  async fn read<T, F>(&self, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    let guard = CancelOnDrop::new();
    let flag = guard.flag();
    let out = self
      .conn
      .call(move |conn| {
        if cancelled(&flag) {
          return Ok(Err(Error::Cancelled));
        }
        Ok(op(conn))
      })
      .await?;
    drop(guard);
    out
  }

  /// Run `op` in one transaction: committed if it succeeds, rolled back if it
  /// fails or the caller went away meanwhile.
  async fn transact<T, F>(&self, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    let guard = CancelOnDrop::new();
    let flag = guard.flag();
    let out = self
      .conn
      .call(move |conn| {
        if cancelled(&flag) {
          return Ok(Err(Error::Cancelled));
        }
        let tx = conn.transaction()?;
        let value = match op(&tx) {
          Ok(value) => value,
          // Dropping `tx` rolls back.
          Err(e) => return Ok(Err(e)),
        };
        if cancelled(&flag) {
          return Ok(Err(Error::Cancelled));
        }
        tx.commit()?;
        Ok(Ok(value))
      })
      .await?;
    drop(guard);
    out
  }
}

// ─── AffiliationStore impl ───────────────────────────────────────────────────

impl AffiliationStore for SqliteStore {
  type Error = Error;

  // ── Profiles ──────────────────────────────────────────────────────────

  async fn list_profiles(&self, page: PageRequest) -> Result<Page<UniqueIdentityNested>> {
    self.read(move |conn| nested::query_unique_identities(conn, &page, false)).await
  }

  async fn get_profile(&self, uuid: String) -> Result<UniqueIdentityNested> {
    self.read(move |conn| nested::unique_identity(conn, &uuid)).await
  }

  async fn add_profile(&self, uuid: String, input: ProfileInput) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        let profile = input.apply_to(&Profile::empty(uuid.as_str()))?;
        uidentities::add(conn, &uuid)?;
        profiles::add(conn, &profile, false)?;
        nested::unique_identity(conn, &uuid)
      })
      .await
  }

  async fn edit_profile(&self, uuid: String, input: ProfileInput) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        let current = profiles::require(conn, &uuid)?;
        let edited = input.apply_to(&current)?;
        profiles::edit(conn, &edited, false)?;
        nested::unique_identity(conn, &uuid)
      })
      .await
  }

  async fn delete_profile(&self, uuid: String, archive: bool) -> Result<()> {
    tracing::debug!(%uuid, archive, "deleting profile");
    self
      .transact(move |conn| engine::delete_unique_identity(conn, &uuid, archive))
      .await
      .map_err(|e| e.context("delete_profile"))
  }

  async fn unarchive_profile(&self, uuid: String) -> Result<UniqueIdentityNested> {
    tracing::debug!(%uuid, "unarchiving profile");
    self
      .transact(move |conn| {
        engine::unarchive_unique_identity(conn, &uuid)?;
        nested::unique_identity(conn, &uuid)
      })
      .await
      .map_err(|e| e.context("unarchive_profile"))
  }

  async fn profile_enrollments(&self, uuid: String) -> Result<Vec<EnrollmentNested>> {
    self
      .read(move |conn| {
        uidentities::require(conn, &uuid)?;
        enrollments::nested_by_uuid(conn, &uuid)
      })
      .await
  }

  // ── Identities ────────────────────────────────────────────────────────

  async fn get_identity(&self, id: String) -> Result<Identity> {
    self.read(move |conn| identities::require(conn, &id)).await
  }

  async fn add_identity(&self, identity: NewIdentity) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        let uuid = engine::add_identity(conn, identity)?;
        nested::unique_identity(conn, &uuid)
      })
      .await
  }

  async fn add_identities(&self, batch: Vec<NewIdentity>) -> Result<Vec<UniqueIdentityNested>> {
    tracing::debug!(identities = batch.len(), "adding identities");
    self
      .transact(move |conn| {
        let mut uuids: Vec<String> = Vec::new();
        for identity in batch {
          let uuid = engine::add_identity(conn, identity)?;
          if !uuids.contains(&uuid) {
            uuids.push(uuid);
          }
        }
        uuids.iter().map(|uuid| nested::unique_identity(conn, uuid)).collect()
      })
      .await
      .map_err(|e| e.context("add_identities"))
  }

  async fn edit_identity(&self, id: String, update: IdentityUpdate) -> Result<Identity> {
    self.transact(move |conn| identities::edit(conn, &id, &update, true)).await
  }

  async fn delete_identity(&self, id: String, archive: bool) -> Result<()> {
    self.transact(move |conn| engine::delete_identity(conn, &id, archive).map(|_| ())).await
  }

  async fn move_identity(
    &self,
    from_id: String,
    to_uuid: String,
    archive: bool,
  ) -> Result<UniqueIdentityNested> {
    tracing::debug!(%from_id, %to_uuid, archive, "moving identity");
    self
      .transact(move |conn| {
        let uuid = match engine::move_identity(conn, &from_id, &to_uuid, archive)? {
          MoveOutcome::Moved(uuid) | MoveOutcome::Restored(uuid) => uuid,
        };
        nested::unique_identity(conn, &uuid)
      })
      .await
      .map_err(|e| e.context("move_identity"))
  }

  async fn merge_unique_identities(
    &self,
    from_uuid: String,
    to_uuid: String,
    archive: bool,
  ) -> Result<UniqueIdentityNested> {
    tracing::debug!(%from_uuid, %to_uuid, archive, "merging unique identities");
    self
      .transact(move |conn| {
        engine::merge_unique_identities(conn, &from_uuid, &to_uuid, archive)?;
        nested::unique_identity(conn, &to_uuid)
      })
      .await
      .map_err(|e| e.context("merge_unique_identities"))
  }

  // ── Organizations ─────────────────────────────────────────────────────

  async fn list_organizations(&self, page: PageRequest) -> Result<Page<OrganizationNested>> {
    self.read(move |conn| nested::query_organizations(conn, &page)).await
  }

  async fn get_organization(&self, id: i64) -> Result<Organization> {
    self.read(move |conn| organizations::require(conn, id)).await
  }

  async fn find_organization_by_name(&self, name: String) -> Result<Organization> {
    self.read(move |conn| organizations::require_by_name(conn, &name)).await
  }

  async fn add_organization(&self, name: String) -> Result<Organization> {
    self.transact(move |conn| organizations::add(conn, name.trim(), true)).await
  }

  async fn edit_organization(&self, id: i64, name: String) -> Result<Organization> {
    self.transact(move |conn| organizations::edit(conn, id, name.trim(), true)).await
  }

  async fn delete_organization(&self, id: i64) -> Result<()> {
    self.transact(move |conn| engine::delete_organization(conn, id)).await
  }

  async fn put_org_domain(
    &self,
    org: String,
    domain: String,
    options: PutOrgDomainOptions,
  ) -> Result<PutOrgDomainOutput> {
    tracing::debug!(%org, %domain, ?options, "attaching domain");
    self
      .transact(move |conn| engine::put_org_domain(conn, &org, &domain, options))
      .await
      .map_err(|e| e.context("put_org_domain"))
  }

  async fn delete_org_domain(&self, org: String, domain: String) -> Result<()> {
    self
      .transact(move |conn| {
        let organization = organizations::require_by_name(conn, &org)?;
        organizations::delete_domain(conn, organization.id, &domain)
      })
      .await
  }

  async fn list_domains(
    &self,
    organization_id: Option<i64>,
    page: PageRequest,
  ) -> Result<Page<Domain>> {
    self.read(move |conn| nested::query_domains(conn, organization_id, &page)).await
  }

  // ── Enrollments ───────────────────────────────────────────────────────

  async fn add_enrollment(
    &self,
    enrollment: NewEnrollment,
    merge: bool,
  ) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        enrollments::add(conn, &enrollment, false)?;
        if merge {
          engine::merge_enrollments(conn, &enrollment.uuid, enrollment.organization_id)?;
        }
        nested::unique_identity(conn, &enrollment.uuid)
      })
      .await
  }

  async fn edit_enrollment(
    &self,
    id: i64,
    update: EnrollmentUpdate,
    merge: bool,
  ) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        validate_id("id", id)?;
        let current = enrollments::require(conn, id)?;
        let edited = update.apply_to(&current)?;
        enrollments::edit(conn, &edited, false)?;
        if merge {
          engine::merge_enrollments(conn, &edited.uuid, edited.organization_id)?;
        }
        nested::unique_identity(conn, &edited.uuid)
      })
      .await
  }

  async fn delete_enrollment(&self, id: i64, archive: bool) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        let deleted = engine::delete_enrollment(conn, id, archive)?;
        nested::unique_identity(conn, &deleted.uuid)
      })
      .await
  }

  async fn delete_enrollments(
    &self,
    uuid: String,
    organization_id: i64,
  ) -> Result<UniqueIdentityNested> {
    self
      .transact(move |conn| {
        enrollments::delete_for(conn, &uuid, organization_id)?;
        nested::unique_identity(conn, &uuid)
      })
      .await
  }

  async fn merge_enrollments(
    &self,
    uuid: String,
    organization_id: i64,
  ) -> Result<UniqueIdentityNested> {
    tracing::debug!(%uuid, organization_id, "merging enrollments");
    self
      .transact(move |conn| {
        uidentities::require(conn, &uuid)?;
        organizations::require(conn, organization_id)?;
        engine::merge_enrollments(conn, &uuid, organization_id)?;
        nested::unique_identity(conn, &uuid)
      })
      .await
      .map_err(|e| e.context("merge_enrollments"))
  }

  // ── Reference tables ──────────────────────────────────────────────────

  async fn list_matching_blacklist(&self, page: PageRequest) -> Result<Page<MatchingBlacklist>> {
    self.read(move |conn| blacklist::list(conn, &page)).await
  }

  async fn add_matching_blacklist(&self, email: String) -> Result<MatchingBlacklist> {
    self.transact(move |conn| blacklist::add(conn, &email)).await
  }

  async fn delete_matching_blacklist(&self, email: String) -> Result<()> {
    self.transact(move |conn| blacklist::delete(conn, &email)).await
  }

  async fn list_countries(&self) -> Result<Vec<Country>> {
    self.read(blacklist::countries).await
  }

  // ── Maintenance ───────────────────────────────────────────────────────

  async fn bulk_update(&self, update: BulkUpdate) -> Result<BulkUpdateOutput> {
    tracing::debug!(add = update.add.len(), del = update.del.len(), "bulk update");
    self
      .transact(move |conn| engine::bulk_update(conn, &update))
      .await
      .map_err(|e| e.context("bulk_update"))
  }

  async fn hide_emails(&self) -> Result<HideEmailsOutput> {
    self.transact(engine::hide_emails).await.map_err(|e| e.context("hide_emails"))
  }

  // ── Reports ───────────────────────────────────────────────────────────

  async fn check_unaffiliated(
    &self,
    rows: Vec<Contribution>,
  ) -> Result<Vec<UnaffiliatedContributor>> {
    self.read(move |conn| reports::check_unaffiliated(conn, &rows)).await
  }

  async fn enrich_contributors(
    &self,
    rows: Vec<ContributorStats>,
    at: DateTime<Utc>,
  ) -> Result<Vec<ContributorStats>> {
    self.read(move |conn| reports::enrich_contributors(conn, rows, at)).await
  }

  async fn all_affiliations(&self) -> Result<Vec<AffiliationProfile>> {
    self.read(reports::all_affiliations).await
  }
}
