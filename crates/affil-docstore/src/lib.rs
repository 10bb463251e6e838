//! Document-store client for contribution analytics.
//!
//! Issues the two aggregation searches the affiliation service needs against
//! the per-project index pattern and implements
//! [`affil_core::remote::ContributionIndex`] over them.

mod client;
mod error;
mod query;

pub use client::{DocStoreClient, DocStoreConfig};
pub use error::{Error, Result};
pub use query::{top_contributors_body, unaffiliated_body};
