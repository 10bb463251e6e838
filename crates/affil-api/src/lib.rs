//! JSON REST API for the affiliation service.
//!
//! Exposes an axum [`Router`] backed by any
//! [`affil_core::store::AffiliationStore`] plus the outbound collaborators in
//! [`AppState`]. Listening, request ids and concurrency limits are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = affil_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod analytics;
pub mod directory;
pub mod enrollments;
pub mod error;
pub mod health;
pub mod identities;
pub mod maintenance;
pub mod organizations;
pub mod params;
pub mod profiles;
pub mod reference;

use std::sync::Arc;

use affil_core::{
  remote::{ContributionIndex, OrganizationDirectory, UserDirectory},
  store::AffiliationStore,
};
use axum::{
  Router,
  routing::{delete, get, post, put},
};

pub use error::ApiError;

/// `{"text": ...}` acknowledgement for operations with nothing to return.
#[derive(Debug, serde::Serialize)]
pub struct TextStatus {
  pub text: String,
}

impl TextStatus {
  pub fn new(text: impl Into<String>) -> axum::Json<Self> {
    axum::Json(Self { text: text.into() })
  }
}

/// Everything a handler can reach.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub index: Arc<dyn ContributionIndex>,
  pub orgs:  Arc<dyn OrganizationDirectory>,
  pub users: Arc<dyn UserDirectory>,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      index: self.index.clone(),
      orgs:  self.orgs.clone(),
      users: self.users.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: AffiliationStore + 'static,
{
  Router::new()
    .route("/health", get(health::handler))
    // Profiles
    .route("/profiles", get(profiles::list::<S>))
    .route(
      "/profile/{uuid}",
      get(profiles::get_one::<S>)
        .post(profiles::create::<S>)
        .put(profiles::edit::<S>)
        .delete(profiles::remove::<S>),
    )
    .route("/profile/{uuid}/enrollments", get(profiles::enrollments::<S>))
    .route("/unarchive_profile/{uuid}", post(profiles::unarchive::<S>))
    // Identities
    .route("/identity", post(identities::create::<S>))
    .route("/identities", post(identities::create_many::<S>))
    .route(
      "/identity/{id}",
      get(identities::get_one::<S>)
        .put(identities::edit::<S>)
        .delete(identities::remove::<S>),
    )
    .route("/move_identity/{from_id}/{to_uuid}", put(identities::move_identity::<S>))
    .route(
      "/merge_unique_identities/{from_uuid}/{to_uuid}",
      put(identities::merge::<S>),
    )
    // Organizations
    .route("/organizations", get(organizations::list::<S>))
    .route("/organization", post(organizations::create::<S>))
    .route(
      "/organization/{id}",
      get(organizations::get_one::<S>)
        .put(organizations::edit::<S>)
        .delete(organizations::remove::<S>),
    )
    .route("/organization_by_name/{name}", get(organizations::by_name::<S>))
    .route(
      "/org_domain/{org}/{domain}",
      put(organizations::put_domain::<S>).delete(organizations::delete_domain::<S>),
    )
    .route("/domains", get(organizations::domains::<S>))
    // Enrollments
    .route("/enrollment", post(enrollments::create::<S>))
    .route(
      "/enrollment/{id}",
      put(enrollments::edit::<S>).delete(enrollments::remove::<S>),
    )
    .route("/enrollments/{uuid}/{org_id}", delete(enrollments::remove_all::<S>))
    .route("/merge_enrollments/{uuid}/{org_id}", put(enrollments::merge::<S>))
    // Reference tables
    .route(
      "/matching_blacklist",
      get(reference::blacklist::<S>).post(reference::add_blacklist::<S>),
    )
    .route("/matching_blacklist/{email}", delete(reference::remove_blacklist::<S>))
    .route("/countries", get(reference::countries::<S>))
    // Maintenance
    .route("/bulk_update", post(maintenance::bulk_update::<S>))
    .route("/hide_emails", put(maintenance::hide_emails::<S>))
    // Analytics
    .route("/unaffiliated/{*slug}", get(analytics::unaffiliated::<S>))
    .route("/top_contributors/{*slug}", get(analytics::top_contributors::<S>))
    .route("/top_contributors_csv/{*slug}", get(analytics::top_contributors_csv::<S>))
    .route("/all", get(analytics::all::<S>))
    // Directories
    .route("/directory/organizations", get(directory::organizations::<S>))
    .route("/directory/users", get(directory::users::<S>))
    .with_state(state)
}
