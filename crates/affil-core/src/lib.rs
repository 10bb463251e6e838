//! Core types and trait definitions for the affiliation knowledge base.
//!
//! This crate is free of HTTP and database dependencies. It holds the identity
//! graph model, the pure algorithms over it (date-range merge, identity ids,
//! dump normalisation) and the traits the backends implement.

// Native `async fn` in traits; the store trait spells out `Send` futures.
#![allow(async_fn_in_trait)]

pub mod affiliations;
pub mod analytics;
pub mod dates;
pub mod error;
pub mod identity;
pub mod model;
pub mod redact;
pub mod remote;
pub mod store;

pub use error::{Coded, Error, ErrorKind, Result};
