//! Bulk maintenance of the identity graph.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/bulk_update` | Body: [`BulkUpdate`], profiles in `/all` format |
//! | `PUT`  | `/hide_emails` | strips `@domain` from email-like names |

use affil_core::{
  affiliations::{BulkUpdate, BulkUpdateOutput},
  store::AffiliationStore,
};
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, TextStatus, error::ApiError, params::JsonBody};

#[derive(Debug, Serialize)]
pub struct BulkUpdateStatus {
  pub text: String,
  #[serde(flatten)]
  pub done: BulkUpdateOutput,
}

/// `POST /bulk_update`
pub async fn bulk_update<S: AffiliationStore>(
  State(state): State<AppState<S>>,
  JsonBody(update): JsonBody<BulkUpdate>,
) -> Result<Json<BulkUpdateStatus>, ApiError> {
  let (add, del) = (update.add.len(), update.del.len());
  let done = state.store.bulk_update(update).await.map_err(ApiError::store)?;
  let text = done.summary(add, del);
  tracing::info!(add, del, added = done.added, deleted = done.deleted, "bulk update applied");
  Ok(Json(BulkUpdateStatus { text, done }))
}

/// `PUT /hide_emails`
pub async fn hide_emails<S: AffiliationStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<TextStatus>, ApiError> {
  let out = state.store.hide_emails().await.map_err(ApiError::store)?;
  Ok(TextStatus::new(format!(
    "Hidden emails: profiles: {}, identities: {}",
    out.profiles, out.identities
  )))
}
