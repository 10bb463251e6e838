//! SQLite backend for the affiliation knowledge base.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The identity-graph engine lives in
//! [`engine`]; it composes the typed CRUD of [`repo`] inside one transaction.

mod countries;
mod db;
mod encode;
mod reports;
mod schema;
mod store;

pub mod engine;
pub mod error;
pub mod repo;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
