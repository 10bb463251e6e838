//! The `AffiliationStore` trait: one method per inbound operation on the
//! identity graph.
//!
//! Implemented by storage backends (e.g. `affil-store-sqlite`). The HTTP layer
//! depends on this abstraction, not on any concrete backend. Every mutating
//! method runs in exactly one database transaction.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  affiliations::{AffiliationProfile, BulkUpdate, BulkUpdateOutput, HideEmailsOutput},
  analytics::{Contribution, ContributorStats, UnaffiliatedContributor},
  error::Coded,
  model::{
    Country, Domain, EnrollmentNested, EnrollmentUpdate, Identity, IdentityUpdate,
    MatchingBlacklist, NewEnrollment, NewIdentity, Organization, OrganizationNested, Page,
    PageRequest, ProfileInput, PutOrgDomainOptions, PutOrgDomainOutput, UniqueIdentityNested,
  },
};

pub trait AffiliationStore: Send + Sync {
  type Error: std::error::Error + Coded + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Page through unique identities with their profile, identities and
  /// enrollments. Identity-less profiles are included.
  fn list_profiles(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<UniqueIdentityNested>, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    uuid: String,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  /// Create a unique identity and its profile. An existing `uuid` conflicts.
  fn add_profile(
    &self,
    uuid: String,
    input: ProfileInput,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  fn edit_profile(
    &self,
    uuid: String,
    input: ProfileInput,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  /// Delete a unique identity and everything under it, archiving the whole
  /// sub-graph first when `archive` is set.
  fn delete_profile(
    &self,
    uuid: String,
    archive: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Restore the newest archived checkpoint of `uuid`.
  fn unarchive_profile(
    &self,
    uuid: String,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  fn profile_enrollments(
    &self,
    uuid: String,
  ) -> impl Future<Output = Result<Vec<EnrollmentNested>, Self::Error>> + Send + '_;

  // ── Identities ────────────────────────────────────────────────────────

  fn get_identity(
    &self,
    id: String,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  /// Insert an identity under its derived id. Without a `uuid` a new unique
  /// identity and profile are created for it.
  fn add_identity(
    &self,
    identity: NewIdentity,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  /// [`Self::add_identity`] for each identity, all or none. Returns the
  /// touched unique identities in input order, without repeats.
  fn add_identities(
    &self,
    identities: Vec<NewIdentity>,
  ) -> impl Future<Output = Result<Vec<UniqueIdentityNested>, Self::Error>> + Send + '_;

  fn edit_identity(
    &self,
    id: String,
    update: IdentityUpdate,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  fn delete_identity(
    &self,
    id: String,
    archive: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Re-parent identity `from_id` under `to_uuid`. With `archive`, a repeat of
  /// a previous archived move is undone instead.
  fn move_identity(
    &self,
    from_id: String,
    to_uuid: String,
    archive: bool,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  fn merge_unique_identities(
    &self,
    from_uuid: String,
    to_uuid: String,
    archive: bool,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  // ── Organizations ─────────────────────────────────────────────────────

  fn list_organizations(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<OrganizationNested>, Self::Error>> + Send + '_;

  fn get_organization(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  fn find_organization_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  fn add_organization(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  fn edit_organization(
    &self,
    id: i64,
    name: String,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  /// Delete an organization; its domains and enrollments cascade.
  fn delete_organization(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Bind `domain` to organization `org` and optionally enroll every profile
  /// whose email ends with it.
  fn put_org_domain(
    &self,
    org: String,
    domain: String,
    options: PutOrgDomainOptions,
  ) -> impl Future<Output = Result<PutOrgDomainOutput, Self::Error>> + Send + '_;

  fn delete_org_domain(
    &self,
    org: String,
    domain: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_domains(
    &self,
    organization_id: Option<i64>,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Domain>, Self::Error>> + Send + '_;

  // ── Enrollments ───────────────────────────────────────────────────────

  /// Insert an enrollment; with `merge`, collapse overlapping intervals of the
  /// same organization afterwards.
  fn add_enrollment(
    &self,
    enrollment: NewEnrollment,
    merge: bool,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  fn edit_enrollment(
    &self,
    id: i64,
    update: EnrollmentUpdate,
    merge: bool,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  fn delete_enrollment(
    &self,
    id: i64,
    archive: bool,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  /// Delete every enrollment of `uuid` in one organization.
  fn delete_enrollments(
    &self,
    uuid: String,
    organization_id: i64,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  fn merge_enrollments(
    &self,
    uuid: String,
    organization_id: i64,
  ) -> impl Future<Output = Result<UniqueIdentityNested, Self::Error>> + Send + '_;

  // ── Reference tables ──────────────────────────────────────────────────

  fn list_matching_blacklist(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<MatchingBlacklist>, Self::Error>> + Send + '_;

  fn add_matching_blacklist(
    &self,
    email: String,
  ) -> impl Future<Output = Result<MatchingBlacklist, Self::Error>> + Send + '_;

  fn delete_matching_blacklist(
    &self,
    email: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_countries(&self) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Remove the unique identities listed in `del`, then create or replace
  /// those listed in `add` from their dump entries. One transaction.
  fn bulk_update(
    &self,
    update: BulkUpdate,
  ) -> impl Future<Output = Result<BulkUpdateOutput, Self::Error>> + Send + '_;

  /// Cut email-like profile names and identity names/usernames down to the
  /// part before `@`.
  fn hide_emails(&self) -> impl Future<Output = Result<HideEmailsOutput, Self::Error>> + Send + '_;

  // ── Reports ───────────────────────────────────────────────────────────

  /// Keep the contributors that are known, not bots and not enrolled
  /// anywhere, most contributions first.
  fn check_unaffiliated(
    &self,
    rows: Vec<Contribution>,
  ) -> impl Future<Output = Result<Vec<UnaffiliatedContributor>, Self::Error>> + Send + '_;

  /// Attach name, email and the organization enrolled at instant `at`.
  fn enrich_contributors(
    &self,
    rows: Vec<ContributorStats>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<ContributorStats>, Self::Error>> + Send + '_;

  fn all_affiliations(
    &self,
  ) -> impl Future<Output = Result<Vec<AffiliationProfile>, Self::Error>> + Send + '_;
}
