//! `GET /health`

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
  pub date_time:           DateTime<Utc>,
  pub affiliation_service: &'static str,
}

/// Readiness check; touches no backend.
pub async fn handler() -> Json<Health> {
  Json(Health { date_time: Utc::now(), affiliation_service: "Running" })
}
